use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use log::{debug, info, warn};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::entry::EntryKind;
use super::package::{
    CONTAINER_PATH, Package, base_dir, fix_page_progression, parse_container_xml, parse_manifest,
};
use crate::css::rewrite_stylesheet;
use crate::document::{DocumentError, patch_document};
use crate::error::{Error, Result};
use crate::options::FixOptions;
use crate::util::{decode_text, encode_text};

const MIMETYPE: &str = "mimetype";

/// What a repair changed in one archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct RepairSummary {
    /// Content documents rewritten.
    pub documents: usize,
    /// Standalone stylesheets rewritten.
    pub stylesheets: usize,
    /// Whether the package document was rewritten.
    pub package: bool,
    /// Whether `mimetype` had to be moved to the front or stored.
    pub mimetype: bool,
}

impl RepairSummary {
    /// True when the output is entry-for-entry identical to the input.
    pub fn is_unchanged(&self) -> bool {
        self.documents == 0 && self.stylesheets == 0 && !self.package && !self.mimetype
    }

    fn record(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::Markup(_) => self.documents += 1,
            EntryKind::Stylesheet => self.stylesheets += 1,
            EntryKind::Package => self.package = true,
            EntryKind::Verbatim => {}
        }
    }
}

/// Repair an EPUB file on disk with default options.
///
/// `output` may be the same path as `input`; the original is only
/// replaced once the repaired archive has been fully written.
///
/// # Example
///
/// ```no_run
/// let summary = yoko::fix_epub("novel.epub", "novel.fixed.epub")?;
/// println!("{} documents rewritten", summary.documents);
/// # Ok::<(), yoko::Error>(())
/// ```
pub fn fix_epub<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<RepairSummary> {
    fix_epub_with(input, output, &FixOptions::default())
}

/// Repair an EPUB file on disk.
pub fn fix_epub_with<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &FixOptions,
) -> Result<RepairSummary> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.is_file() {
        return Err(Error::Validation(format!(
            "input file not found: {}",
            input.display()
        )));
    }

    let overwrite = is_same_file(input, output);
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    let summary = {
        let source = BufReader::new(File::open(input)?);
        let mut sink = BufWriter::new(temp.as_file_mut());
        let summary = repair_archive(source, &mut sink, options)?;
        sink.flush()?;
        summary
    };
    temp.as_file().sync_all()?;

    if overwrite && summary.is_unchanged() {
        info!("{}: nothing to repair", input.display());
        return Ok(summary);
    }

    // Temp files are created private; keep the input's mode instead
    fs::set_permissions(temp.path(), fs::metadata(input)?.permissions())?;
    temp.persist(output).map_err(|err| Error::Io(err.error))?;

    info!(
        "{} -> {}: {} documents, {} stylesheets rewritten",
        input.display(),
        output.display(),
        summary.documents,
        summary.stylesheets
    );
    Ok(summary)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Repair an EPUB read from `reader`, writing the result to `writer`.
///
/// Entries keep their order, except that `mimetype` is moved to the front
/// and stored. Entries that need no change are copied without
/// recompression.
pub fn repair_archive<R: Read + Seek, W: Write + Seek>(
    reader: R,
    writer: W,
    options: &FixOptions,
) -> Result<RepairSummary> {
    let mut archive = ZipArchive::new(reader)?;
    check_encryption(&mut archive)?;

    let package = locate_package(&mut archive);
    let package_path = package.as_ref().map(|p| p.path.as_str());

    let mut zip = ZipWriter::new(writer);
    let mut summary = RepairSummary {
        mimetype: archive.index_for_name(MIMETYPE).is_some_and(|i| i != 0),
        ..RepairSummary::default()
    };

    for index in entry_order(&archive) {
        let (name, method) = {
            let entry = archive.by_index_raw(index)?;
            (entry.name().to_string(), entry.compression())
        };
        let media_type = package.as_ref().and_then(|p| p.media_type(&name));
        let kind = EntryKind::classify(&name, media_type, package_path);

        let patched = match kind {
            EntryKind::Package if !options.page_progression => None,
            kind if kind.is_text() => {
                let bytes = read_entry(&mut archive, index)?;
                patch_entry(&name, kind, &bytes)?
            }
            _ => None,
        };

        if let Some(bytes) = patched {
            debug!("rewrote {name}");
            let file_options = {
                let entry = archive.by_index_raw(index)?;
                let mut file_options =
                    SimpleFileOptions::default().compression_method(match method {
                        CompressionMethod::Stored => CompressionMethod::Stored,
                        _ => CompressionMethod::Deflated,
                    });
                if let Some(time) = entry.last_modified() {
                    file_options = file_options.last_modified_time(time);
                }
                if let Some(mode) = entry.unix_mode() {
                    file_options = file_options.unix_permissions(mode);
                }
                file_options
            };
            zip.start_file(name.as_str(), file_options)?;
            zip.write_all(&bytes)?;
            summary.record(kind);
        } else if name == MIMETYPE && method != CompressionMethod::Stored {
            // Readers require an uncompressed mimetype
            let bytes = read_entry(&mut archive, index)?;
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file(MIMETYPE, stored)?;
            zip.write_all(&bytes)?;
            summary.mimetype = true;
        } else {
            zip.raw_copy_file(archive.by_index_raw(index)?)?;
        }
    }

    zip.finish()?;
    Ok(summary)
}

/// Indices in archive order, with `mimetype` moved to the front.
fn entry_order<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<usize> {
    let mimetype = archive.index_for_name(MIMETYPE);
    mimetype
        .into_iter()
        .chain((0..archive.len()).filter(|&i| Some(i) != mimetype))
        .collect()
}

fn check_encryption<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.encrypted() {
            return Err(Error::Encrypted(entry.name().to_string()));
        }
    }
    Ok(())
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> Result<Vec<u8>> {
    let mut entry = archive.by_index(index)?;
    // The declared size comes from the archive and may be forged
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_named<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let index = archive
        .index_for_name(name)
        .ok_or_else(|| Error::Validation(format!("missing {name}")))?;
    read_entry(archive, index)
}

/// Rewrite one text entry, returning the new bytes if anything changed.
fn patch_entry(name: &str, kind: EntryKind, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let parse_error = |source: DocumentError| Error::Parse {
        entry: name.to_string(),
        source,
    };

    let decoded = decode_text(bytes).map_err(parse_error)?;
    let patched = match kind {
        EntryKind::Markup(markup) => patch_document(&decoded.text, markup).map_err(parse_error)?,
        EntryKind::Stylesheet => rewrite_stylesheet(&decoded.text),
        EntryKind::Package => fix_page_progression(&decoded.text).map_err(parse_error)?,
        EntryKind::Verbatim => None,
    };

    Ok(patched.map(|text| encode_text(&text, decoded.encoding)))
}

/// Find the package document and read its manifest.
///
/// A missing or broken package is not fatal: entries are then classified
/// by extension alone.
fn locate_package<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Option<Package> {
    match read_package(archive) {
        Ok(package) => Some(package),
        Err(err) => {
            warn!("cannot read package document ({err}); classifying entries by extension");
            None
        }
    }
}

fn read_package<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Package> {
    let parse_error = |entry: &str| {
        let entry = entry.to_string();
        move |source: DocumentError| Error::Parse { entry, source }
    };

    let container = read_named(archive, CONTAINER_PATH)?;
    let container = decode_text(&container).map_err(parse_error(CONTAINER_PATH))?;
    let path = parse_container_xml(&container.text)
        .map_err(parse_error(CONTAINER_PATH))?
        .ok_or_else(|| Error::Validation(format!("no rootfile in {CONTAINER_PATH}")))?;

    let opf = read_named(archive, &path)?;
    let opf = decode_text(&opf).map_err(parse_error(&path))?;
    let media_types = parse_manifest(&opf.text, base_dir(&path)).map_err(parse_error(&path))?;

    Ok(Package::new(path, media_types))
}
