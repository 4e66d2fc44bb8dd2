//! Repairing many files in one run.
//!
//! A [`BatchFixer`] processes files one after another and never stops on
//! a single failure. Its [`Progress`] can be shared with other threads to
//! watch the run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::epub::fix_epub_with;
use crate::error::{Error, Result};
use crate::options::FixOptions;

/// Where repaired files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Replace each input file in place.
    Overwrite,
    /// Write each result to this directory under the input's file name.
    Directory(PathBuf),
}

impl OutputTarget {
    fn path_for(&self, input: &Path) -> Result<PathBuf> {
        match self {
            OutputTarget::Overwrite => Ok(input.to_path_buf()),
            OutputTarget::Directory(dir) => {
                let name = input.file_name().ok_or_else(|| {
                    Error::Validation(format!("not a file path: {}", input.display()))
                })?;
                Ok(dir.join(name))
            }
        }
    }
}

/// A point-in-time view of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ProgressSnapshot {
    /// Files finished so far, successful or not.
    pub processed: usize,
    pub total: usize,
    /// File name of the file being repaired (or last repaired).
    pub current: String,
}

/// Progress of a batch run, written by the fixer and readable from any
/// thread.
#[derive(Debug, Default)]
pub struct Progress {
    state: Mutex<ProgressSnapshot>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        // A panicking observer must not take the batch down with it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start(&self, total: usize) {
        *self.lock() = ProgressSnapshot {
            processed: 0,
            total,
            current: String::new(),
        };
    }

    fn begin_file(&self, name: String) {
        self.lock().current = name;
    }

    fn finish_file(&self) {
        self.lock().processed += 1;
    }
}

/// A file that could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub failed_files: Vec<FailedFile>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Repairs a list of EPUB files, isolating per-file failures.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use yoko::{BatchFixer, OutputTarget};
///
/// let fixer = BatchFixer::new();
/// let progress = fixer.progress();
/// std::thread::spawn(move || println!("{:?}", progress.snapshot()));
///
/// let report = fixer.run(&["a.epub", "b.epub"], &OutputTarget::Directory(PathBuf::from("fixed")))?;
/// println!("{}/{} repaired", report.success, report.total);
/// # Ok::<(), yoko::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct BatchFixer {
    options: FixOptions,
    progress: Arc<Progress>,
}

impl BatchFixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FixOptions) -> Self {
        Self {
            options,
            progress: Arc::new(Progress::new()),
        }
    }

    /// Shared handle for observers.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn get_progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Repair every file in `paths`, in order.
    ///
    /// Fails only when `paths` is empty or the output directory cannot be
    /// created; individual file failures end up in the report. In
    /// directory mode an input whose file name was already written fails
    /// instead of replacing the earlier output.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P], target: &OutputTarget) -> Result<BatchReport> {
        if paths.is_empty() {
            return Err(Error::Validation("no input files".to_string()));
        }

        if let OutputTarget::Directory(dir) = target {
            fs::create_dir_all(dir)?;
        }

        let mut report = BatchReport {
            total: paths.len(),
            ..Default::default()
        };
        self.progress.start(paths.len());
        let mut written: HashSet<PathBuf> = HashSet::new();

        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            self.progress.begin_file(name);

            let outcome = target.path_for(path).and_then(|output| {
                if written.contains(&output) {
                    return Err(Error::Validation(format!(
                        "{} was already written from an earlier input",
                        output.display()
                    )));
                }
                fix_epub_with(path, &output, &self.options)?;
                if let OutputTarget::Directory(_) = target {
                    written.insert(output);
                }
                Ok(())
            });

            match outcome {
                Ok(_) => report.success += 1,
                Err(err) => {
                    warn!("{}: {err}", path.display());
                    report.failed += 1;
                    report.failed_files.push(FailedFile {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            }

            self.progress.finish_file();
        }

        info!(
            "batch finished: {} of {} repaired, {} failed",
            report.success, report.total, report.failed
        );
        Ok(report)
    }
}

/// Repair `paths` in place, or into `output_dir` when given.
pub fn batch_fix<P: AsRef<Path>>(paths: &[P], output_dir: Option<&Path>) -> Result<BatchReport> {
    let target = match output_dir {
        Some(dir) => OutputTarget::Directory(dir.to_path_buf()),
        None => OutputTarget::Overwrite,
    };
    BatchFixer::new().run(paths, &target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_is_rejected() {
        let paths: [&str; 0] = [];
        assert!(matches!(
            BatchFixer::new().run(&paths, &OutputTarget::Overwrite),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fixer = BatchFixer::new();
        let report = fixer
            .run(
                &["/nonexistent/a.epub", "/nonexistent/b.epub"],
                &OutputTarget::Directory(dir.path().join("out")),
            )
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failed_files[0].path, PathBuf::from("/nonexistent/a.epub"));
        assert!(report.failed_files[0].reason.contains("not found"));

        let progress = fixer.get_progress();
        assert_eq!(progress.processed, 2);
        assert_eq!(progress.current, "b.epub");
    }

    #[test]
    fn test_poisoned_progress_is_recovered() {
        let progress = Arc::new(Progress::new());
        progress.start(3);

        let clone = Arc::clone(&progress);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock();
            panic!("observer crashed");
        })
        .join();

        progress.finish_file();
        assert_eq!(progress.snapshot().processed, 1);
    }
}
