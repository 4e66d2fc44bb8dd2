//! Rebuilding a single start tag with one attribute changed.

use quick_xml::events::BytesStart;
use quick_xml::events::attributes::Attributes;

use super::{DocumentError, MarkupKind};

/// Attribute iterator suited to the markup flavor.
///
/// HTML allows unquoted and valueless attributes; neither flavor rejects
/// duplicates, since sloppy documents are common.
pub(crate) fn attributes<'a>(tag: &'a BytesStart<'a>, kind: MarkupKind) -> Attributes<'a> {
    let mut attributes = match kind {
        MarkupKind::Xhtml => tag.attributes(),
        MarkupKind::Html => tag.html_attributes(),
    };
    attributes.with_checks(false);
    attributes
}

/// Returns the raw (still escaped) value of an attribute, if present.
pub(crate) fn raw_attribute(
    tag: &BytesStart<'_>,
    kind: MarkupKind,
    name: &[u8],
) -> Result<Option<String>, DocumentError> {
    for attr in attributes(tag, kind) {
        let attr = attr?;
        if attr.key.as_ref().eq_ignore_ascii_case(name) {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

/// Serialize `tag` with the attribute `name` given a new raw value.
///
/// `None` drops the attribute. Other attributes keep their raw values and
/// order; quoting is normalized.
pub(crate) fn rebuild(
    tag: &BytesStart<'_>,
    kind: MarkupKind,
    name: &[u8],
    value: Option<&str>,
    self_closing: bool,
) -> Result<String, DocumentError> {
    let mut out = String::from("<");
    out.push_str(&String::from_utf8_lossy(tag.name().as_ref()));

    for attr in attributes(tag, kind) {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref());

        if attr.key.as_ref().eq_ignore_ascii_case(name) {
            if let Some(value) = value {
                push_attribute(&mut out, &key, value);
            }
        } else {
            push_attribute(&mut out, &key, &String::from_utf8_lossy(&attr.value));
        }
    }

    out.push_str(if self_closing { "/>" } else { ">" });
    Ok(out)
}

fn push_attribute(out: &mut String, key: &str, value: &str) {
    // A raw value that held `"` was single-quoted in the source
    let quote = if value.contains('"') { '\'' } else { '"' };
    out.push(' ');
    out.push_str(key);
    out.push('=');
    out.push(quote);
    out.push_str(value);
    out.push(quote);
}
