//! OPF package handling (container.xml, manifest, spine direction).

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::document::{BOM, DocumentError, MarkupKind, raw_attribute, rebuild};
use crate::util::local_name;

/// Location of the EPUB container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// The package document and the media types its manifest declares.
#[derive(Debug, Default)]
pub struct Package {
    /// Zip path of the OPF file (e.g., "OEBPS/content.opf").
    pub path: String,
    /// Maps zip path -> media type.
    media_types: HashMap<String, String>,
}

impl Package {
    pub fn new(path: impl Into<String>, media_types: HashMap<String, String>) -> Self {
        Self {
            path: path.into(),
            media_types,
        }
    }

    /// Media type the manifest declares for a zip entry.
    pub fn media_type(&self, entry: &str) -> Option<&str> {
        self.media_types
            .get(entry)
            .or_else(|| {
                // Some packagers store percent-encoded names in the zip
                let decoded = percent_decode_str(entry).decode_utf8().ok()?;
                self.media_types.get(decoded.as_ref())
            })
            .map(String::as_str)
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(content: &str) -> Result<Option<String>, DocumentError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = raw_attribute(&e, MarkupKind::Xhtml, b"full-path")? {
                    return Ok(Some(path));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Parse the manifest of an OPF document into zip path -> media type.
///
/// `opf_base` is the directory of the OPF file ("" or "OEBPS/").
pub fn parse_manifest(
    content: &str,
    opf_base: &str,
) -> Result<HashMap<String, String>, DocumentError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut media_types = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"item" => {
                let href = raw_attribute(&e, MarkupKind::Xhtml, b"href")?;
                let media_type = raw_attribute(&e, MarkupKind::Xhtml, b"media-type")?;
                if let (Some(href), Some(media_type)) = (href, media_type) {
                    let href = quick_xml::escape::unescape(&href)
                        .map(|s| s.into_owned())
                        .unwrap_or(href);
                    media_types.insert(resolve_href(opf_base, &href), media_type);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(media_types)
}

/// Resolve a manifest href against the OPF directory into a zip path.
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// Directory part of a zip path, with trailing slash ("" at the root).
pub fn base_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..=i]).unwrap_or("")
}

/// Flip `page-progression-direction="rtl"` on the spine to `ltr`.
///
/// Returns `None` when the spine has no such attribute.
pub fn fix_page_progression(content: &str) -> Result<Option<String>, DocumentError> {
    if let Some(rest) = content.strip_prefix(BOM) {
        return Ok(fix_page_progression(rest)?.map(|fixed| format!("{BOM}{fixed}")));
    }

    let mut reader = Reader::from_str(content);

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"spine" =>
            {
                let direction = raw_attribute(e, MarkupKind::Xhtml, b"page-progression-direction")?;
                if !direction.is_some_and(|d| d.trim().eq_ignore_ascii_case("rtl")) {
                    return Ok(None);
                }

                let self_closing = matches!(event, Event::Empty(_));
                let tag = rebuild(
                    e,
                    MarkupKind::Xhtml,
                    b"page-progression-direction",
                    Some("ltr"),
                    self_closing,
                )?;

                let mut result = content.to_string();
                result.replace_range(before..after, &tag);
                return Ok(Some(result));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
