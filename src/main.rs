//! yoko - fix EPUBs stuck in vertical writing mode

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use yoko::{BatchFixer, BatchReport, FailedFile, FixOptions, OutputTarget, fix_epub_with};

#[derive(Parser)]
#[command(name = "yoko")]
#[command(version, about = "Convert vertical-writing EPUBs to horizontal layout", long_about = None)]
#[command(after_help = "EXAMPLES:
    yoko book.epub -o book.fixed.epub    Repair one file
    yoko *.epub -d fixed/                Repair many files into a directory
    yoko *.epub --output-dir fixed/      Same as -d
    yoko *.epub --overwrite              Repair files in place")]
struct Cli {
    /// EPUB files to repair
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Output file (single input only)
    #[arg(short, long, value_name = "OUT", conflicts_with_all = ["dir", "overwrite"])]
    output: Option<PathBuf>,

    /// Output directory for repaired files
    #[arg(
        short,
        long,
        visible_alias = "output-dir",
        value_name = "DIR",
        conflicts_with = "overwrite"
    )]
    dir: Option<PathBuf>,

    /// Replace the input files
    #[arg(long)]
    overwrite: bool,

    /// Also switch the reading direction from right-to-left to left-to-right
    #[arg(long)]
    page_direction: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Show debug output and list failed files
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let options = FixOptions::new().with_page_progression(cli.page_direction);

    let result = match (&cli.output, &cli.dir, cli.overwrite) {
        (Some(output), _, _) => {
            if cli.files.len() != 1 {
                eprintln!("error: --output takes exactly one input file");
                return ExitCode::FAILURE;
            }
            Ok(fix_single(&cli.files[0], output, &options))
        }
        (None, Some(dir), _) => {
            BatchFixer::with_options(options).run(&cli.files, &OutputTarget::Directory(dir.clone()))
        }
        (None, None, true) => BatchFixer::with_options(options).run(&cli.files, &OutputTarget::Overwrite),
        (None, None, false) => {
            eprintln!("error: one of --output, --dir or --overwrite is required");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(report) => {
            print_report(&report, &cli);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

/// Run a single repair, folding the outcome into a one-file report.
fn fix_single(input: &Path, output: &Path, options: &FixOptions) -> BatchReport {
    let mut report = BatchReport {
        total: 1,
        ..Default::default()
    };
    match fix_epub_with(input, output, options) {
        Ok(_) => report.success = 1,
        Err(e) => {
            log::warn!("{}: {e}", input.display());
            report.failed = 1;
            report.failed_files.push(FailedFile {
                path: input.to_path_buf(),
                reason: e.to_string(),
            });
        }
    }
    report
}

fn print_report(report: &BatchReport, cli: &Cli) {
    if cli.json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: {e}"),
        }
        return;
    }

    if cli.quiet {
        return;
    }

    println!(
        "Repaired {} of {} file(s), {} failed",
        report.success, report.total, report.failed
    );
    if cli.verbose {
        for FailedFile { path, reason } in &report.failed_files {
            println!("  {}: {reason}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_dir_spellings() {
        for flag in ["-d", "--dir", "--output-dir"] {
            let cli = Cli::try_parse_from(["yoko", "a.epub", "b.epub", flag, "fixed"]).unwrap();
            assert_eq!(cli.dir, Some(PathBuf::from("fixed")));
            assert_eq!(cli.files.len(), 2);
        }
    }

    #[test]
    fn test_output_dir_conflicts_with_overwrite() {
        assert!(Cli::try_parse_from(["yoko", "a.epub", "--output-dir", "fixed", "--overwrite"]).is_err());
    }
}
