//! Content document patching.
//!
//! A document is streamed with quick-xml purely to learn where things
//! are; the result is the source text with a few byte ranges replaced:
//!
//! - the text of each `<style>` element, rewritten as a stylesheet
//! - each start tag whose `style` attribute needed rewriting
//! - one injected `<style>` block carrying [`FIX_CSS`]
//!
//! Everything else is passed through untouched.

mod tag;

use std::ops::Range;

use quick_xml::Reader;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::css;
use crate::util::local_name;

pub(crate) use tag::{raw_attribute, rebuild};

/// `id` of the injected `<style>` element; its presence marks a document
/// as already patched.
pub const FIX_STYLE_ID: &str = "yoko-horizontal-fix";

/// Corrective stylesheet injected into every content document.
pub const FIX_CSS: &str = r#"
/* yoko: horizontal writing fix */
body {
    writing-mode: horizontal-tb !important;
    -webkit-writing-mode: horizontal-tb !important;
    -epub-writing-mode: horizontal-tb !important;
    direction: ltr;
}
* {
    writing-mode: horizontal-tb !important;
    -webkit-writing-mode: horizontal-tb !important;
    -epub-writing-mode: horizontal-tb !important;
    text-orientation: mixed !important;
}
body, p, div, span {
    font-family: "Microsoft YaHei", "PingFang SC", "Noto Sans CJK SC", "Source Han Sans SC", "SimSun", sans-serif;
}
"#;

pub(crate) const BOM: char = '\u{feff}';

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Errors for a single content document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attribute(#[from] AttrError),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("no <html>, <head> or <body> element")]
    NotHtml,
}

/// Markup flavor of a content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    /// Well-formed XML: end tags must match.
    Xhtml,
    /// Tag soup: mismatched end tags and bare attributes are tolerated.
    Html,
}

/// A pending replacement of `range` in the source.
#[derive(Debug)]
struct Splice {
    range: Range<usize>,
    text: String,
}

/// Where the fix stylesheet can go, in order of preference.
#[derive(Debug, Default)]
struct Anchors {
    head_end: Option<usize>,
    /// Range and rebuilt open tag of a self-closing `<head/>`.
    empty_head: Option<(Range<usize>, String)>,
    body_start: Option<usize>,
    html_open_end: Option<usize>,
    has_fix_style: bool,
}

/// Patch one content document.
///
/// Returns `Ok(None)` when the document needs no change, which is also
/// what a second pass over already patched output returns.
pub fn patch_document(source: &str, kind: MarkupKind) -> Result<Option<String>, DocumentError> {
    // Offsets below are relative to the text after the BOM
    if let Some(rest) = source.strip_prefix(BOM) {
        return Ok(patch_document(rest, kind)?.map(|patched| format!("{BOM}{patched}")));
    }

    let mut reader = Reader::from_str(source);
    if kind == MarkupKind::Html {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut splices = Vec::new();
    let mut anchors = Anchors::default();
    let mut style_content: Option<usize> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let tag_text = rewrite_style_attribute(&e, kind, false)?;
                match local_name(e.name().as_ref()).to_ascii_lowercase().as_slice() {
                    b"html" => anchors.html_open_end = anchors.html_open_end.or(Some(after)),
                    b"body" => anchors.body_start = anchors.body_start.or(Some(before)),
                    b"style" => {
                        anchors.has_fix_style |= is_fix_style(&e, kind)?;
                        style_content = Some(after);
                    }
                    _ => {}
                }
                if let Some(text) = tag_text {
                    splices.push(Splice {
                        range: before..after,
                        text,
                    });
                }
            }
            Event::Empty(e) => {
                let tag_text = rewrite_style_attribute(&e, kind, true)?;
                match local_name(e.name().as_ref()).to_ascii_lowercase().as_slice() {
                    b"head" if anchors.head_end.is_none() && anchors.empty_head.is_none() => {
                        let original = tag_text.as_deref().unwrap_or(&source[before..after]);
                        let open = format!("{}>", original.trim_end_matches("/>"));
                        anchors.empty_head = Some((before..after, open));
                        // The expansion below replaces the whole tag
                        continue;
                    }
                    b"style" => anchors.has_fix_style |= is_fix_style(&e, kind)?,
                    _ => {}
                }
                if let Some(text) = tag_text {
                    splices.push(Splice {
                        range: before..after,
                        text,
                    });
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()).to_ascii_lowercase().as_slice() {
                b"style" => {
                    if let Some(start) = style_content.take()
                        && let Some(text) = rewrite_style_text(&source[start..before])
                    {
                        splices.push(Splice {
                            range: start..before,
                            text,
                        });
                    }
                }
                b"head" => anchors.head_end = anchors.head_end.or(Some(before)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(splice) = injection(anchors)? {
        splices.push(splice);
    }

    if splices.is_empty() {
        return Ok(None);
    }

    // Insertions share a start offset with the tag they precede
    splices.sort_by_key(|s| (s.range.start, s.range.end));

    let mut result = source.to_string();
    for splice in splices.into_iter().rev() {
        result.replace_range(splice.range, &splice.text);
    }

    Ok(Some(result))
}

fn fix_style_element() -> String {
    format!("<style type=\"text/css\" id=\"{FIX_STYLE_ID}\">{FIX_CSS}</style>\n")
}

/// Decide where the fix stylesheet goes, if it is not already there.
fn injection(anchors: Anchors) -> Result<Option<Splice>, DocumentError> {
    if anchors.has_fix_style {
        return Ok(None);
    }

    let style = fix_style_element();

    let splice = if let Some(at) = anchors.head_end {
        Splice {
            range: at..at,
            text: style,
        }
    } else if let Some((range, open)) = anchors.empty_head {
        Splice {
            range,
            text: format!("{open}\n{style}</head>"),
        }
    } else if let Some(at) = anchors.body_start {
        Splice {
            range: at..at,
            text: format!("<head>\n{style}</head>\n"),
        }
    } else if let Some(at) = anchors.html_open_end {
        Splice {
            range: at..at,
            text: format!("\n<head>\n{style}</head>"),
        }
    } else {
        return Err(DocumentError::NotHtml);
    };

    Ok(Some(splice))
}

fn is_fix_style(tag: &BytesStart<'_>, kind: MarkupKind) -> Result<bool, DocumentError> {
    Ok(raw_attribute(tag, kind, b"id")?.as_deref() == Some(FIX_STYLE_ID))
}

/// Rebuild a tag whose `style` attribute contains vertical writing rules.
fn rewrite_style_attribute(
    tag: &BytesStart<'_>,
    kind: MarkupKind,
    self_closing: bool,
) -> Result<Option<String>, DocumentError> {
    let Some(raw) = raw_attribute(tag, kind, b"style")? else {
        return Ok(None);
    };

    // Edits apply to the raw attribute text; entities and quotes pass
    // through verbatim. Replacement keywords are plain ASCII.
    let Some(rewritten) = css::rewrite_inline_style(&raw) else {
        return Ok(None);
    };

    let value = (!rewritten.is_empty()).then_some(rewritten.as_str());
    rebuild(tag, kind, b"style", value, self_closing).map(Some)
}

/// Rewrite the content of a `<style>` element, keeping CDATA markers.
fn rewrite_style_text(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut changed = false;
    let mut push_css = |out: &mut String, css: &str| match css::rewrite_stylesheet(css) {
        Some(fixed) => {
            changed = true;
            out.push_str(&fixed);
        }
        None => out.push_str(css),
    };

    let mut rest = raw;
    while let Some(open) = rest.find(CDATA_OPEN) {
        push_css(&mut out, &rest[..open]);
        out.push_str(CDATA_OPEN);
        rest = &rest[open + CDATA_OPEN.len()..];

        let close = rest.find(CDATA_CLOSE).unwrap_or(rest.len());
        push_css(&mut out, &rest[..close]);
        rest = &rest[close..];
        if let Some(after) = rest.strip_prefix(CDATA_CLOSE) {
            out.push_str(CDATA_CLOSE);
            rest = after;
        }
    }
    push_css(&mut out, rest);

    changed.then_some(out)
}
