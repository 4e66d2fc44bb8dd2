//! Deciding what to do with each archive entry.

use std::path::Path;

use crate::document::MarkupKind;

/// How the pipeline treats an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A content document, patched with [`crate::document::patch_document`].
    Markup(MarkupKind),
    /// A CSS file, rewritten with [`crate::css::rewrite_stylesheet`].
    Stylesheet,
    /// The OPF package document.
    Package,
    /// Copied byte-for-byte.
    Verbatim,
}

impl EntryKind {
    /// Classify an entry by its manifest media type, falling back to its
    /// file extension when the manifest does not list it.
    pub fn classify(name: &str, media_type: Option<&str>, package_path: Option<&str>) -> Self {
        if name.ends_with('/') || name == "mimetype" || name.starts_with("META-INF/") {
            return EntryKind::Verbatim;
        }
        if package_path == Some(name) {
            return EntryKind::Package;
        }

        match media_type {
            Some(media_type) => Self::from_media_type(media_type),
            None => Self::from_extension(name),
        }
    }

    fn from_media_type(media_type: &str) -> Self {
        let essence = media_type.split(';').next().unwrap_or(media_type).trim();

        if essence.eq_ignore_ascii_case("application/xhtml+xml") {
            EntryKind::Markup(MarkupKind::Xhtml)
        } else if essence.eq_ignore_ascii_case("text/html") {
            EntryKind::Markup(MarkupKind::Html)
        } else if essence.eq_ignore_ascii_case("text/css") {
            EntryKind::Stylesheet
        } else if essence.eq_ignore_ascii_case("application/oebps-package+xml") {
            EntryKind::Package
        } else {
            EntryKind::Verbatim
        }
    }

    fn from_extension(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("xhtml" | "xht") => EntryKind::Markup(MarkupKind::Xhtml),
            Some("html" | "htm") => EntryKind::Markup(MarkupKind::Html),
            Some("css") => EntryKind::Stylesheet,
            Some("opf") => EntryKind::Package,
            _ => EntryKind::Verbatim,
        }
    }

    /// True for entries whose text may be rewritten.
    pub fn is_text(self) -> bool {
        !matches!(self, EntryKind::Verbatim)
    }
}
