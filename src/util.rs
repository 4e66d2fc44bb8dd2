//! Text encoding helpers for archive entries.
//!
//! Content documents and stylesheets are edited as `str`, but must be
//! written back in the encoding they came in. UTF-8 (with or without BOM)
//! is borrowed as-is; legacy encodings are decoded with encoding_rs only
//! when the entry declares them.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use memchr::memmem;

use crate::document::DocumentError;

/// How far into an entry to look for a charset declaration.
const SNIFF_LEN: usize = 1024;

/// Text decoded from an archive entry.
#[derive(Debug)]
pub struct DecodedText<'a> {
    pub text: Cow<'a, str>,
    /// Encoding to use when writing the text back.
    pub encoding: &'static Encoding,
}

/// Decode an entry's bytes for editing.
///
/// A UTF-8 BOM stays in the text (as U+FEFF) so it is written back.
/// Encodings that encoding_rs cannot encode to (UTF-16) are rejected.
pub fn decode_text(bytes: &[u8]) -> Result<DecodedText<'_>, DocumentError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedText {
            text: Cow::Borrowed(text),
            encoding: UTF_8,
        });
    }

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Err(unsupported(encoding));
    }

    let label = declared_encoding(bytes).ok_or_else(|| {
        DocumentError::Encoding("not valid UTF-8 and no charset declared".to_string())
    })?;
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| DocumentError::Encoding(format!("unknown charset {label:?}")))?;

    if encoding == UTF_8 || encoding.output_encoding() != encoding {
        return Err(unsupported(encoding));
    }

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| {
            DocumentError::Encoding(format!("malformed {} content", encoding.name()))
        })?;

    Ok(DecodedText { text, encoding })
}

fn unsupported(encoding: &'static Encoding) -> DocumentError {
    if encoding == UTF_8 {
        DocumentError::Encoding("invalid UTF-8".to_string())
    } else {
        DocumentError::Encoding(format!("{} content is not supported", encoding.name()))
    }
}

/// Encode edited text back into the entry's original encoding.
pub fn encode_text(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    // Only ASCII is ever inserted, so nothing here is unmappable
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// Find the charset an entry declares for itself.
///
/// Checks the XML declaration first, then any `charset` mention near the
/// start: `<meta charset="...">`, `content="text/html; charset=..."` and
/// CSS `@charset "...";` all match.
pub fn declared_encoding(bytes: &[u8]) -> Option<&str> {
    if let Some(encoding) = extract_xml_encoding(bytes) {
        return Some(encoding);
    }

    let prefix = &bytes[..bytes.len().min(SNIFF_LEN)];
    let lower = prefix.to_ascii_lowercase();

    for found in memmem::find_iter(&lower, b"charset") {
        let mut i = found + b"charset".len();
        while i < prefix.len() && matches!(prefix[i], b' ' | b'\t' | b'=' | b'"' | b'\'') {
            i += 1;
        }
        let start = i;
        while i < prefix.len()
            && (prefix[i].is_ascii_alphanumeric() || matches!(prefix[i], b'-' | b'_' | b'.' | b':'))
        {
            i += 1;
        }
        if i > start {
            return std::str::from_utf8(&prefix[start..i]).ok();
        }
    }

    None
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    // Look for encoding="..." or encoding='...'
    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let (&quote, rest) = after_enc.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = rest.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&rest[..value_end]).ok()
}

/// Extract local name from potentially namespaced XML name
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"style"), b"style");
        assert_eq!(local_name(b"html:head"), b"head");
    }

    #[test]
    fn test_extract_xml_encoding() {
        let xml = br#"<?xml version="1.0" encoding="GBK"?><html/>"#;
        assert_eq!(extract_xml_encoding(xml), Some("GBK"));

        let single = b"<?xml version='1.0' encoding='shift_jis'?>";
        assert_eq!(extract_xml_encoding(single), Some("shift_jis"));

        assert_eq!(extract_xml_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(extract_xml_encoding(b"<html></html>"), None);
    }

    #[test]
    fn test_declared_encoding_variants() {
        assert_eq!(
            declared_encoding(br#"<html><head><meta charset="gb2312"/>"#),
            Some("gb2312")
        );
        assert_eq!(
            declared_encoding(
                br#"<meta http-equiv="Content-Type" content="text/html; charset=Shift_JIS">"#
            ),
            Some("Shift_JIS")
        );
        assert_eq!(declared_encoding(b"@charset \"EUC-JP\";\nbody {}"), Some("EUC-JP"));
        assert_eq!(declared_encoding(b"body { color: red }"), None);
    }

    #[test]
    fn test_decode_utf8_borrows() {
        let bytes = "\u{feff}<p>縦書き</p>".as_bytes();
        let decoded = decode_text(bytes).unwrap();
        assert!(matches!(decoded.text, Cow::Borrowed(_)));
        assert_eq!(decoded.encoding, UTF_8);
        assert_eq!(encode_text(&decoded.text, decoded.encoding), bytes);
    }

    #[test]
    fn test_decode_declared_legacy_encoding() {
        let (bytes, _, _) = encoding_rs::GBK.encode(r#"<?xml version="1.0" encoding="GBK"?><p>横排文字</p>"#);
        let decoded = decode_text(&bytes).unwrap();

        assert_eq!(decoded.encoding, encoding_rs::GBK);
        assert!(decoded.text.contains("横排文字"));
        assert_eq!(encode_text(&decoded.text, decoded.encoding), bytes.as_ref());
    }

    #[test]
    fn test_decode_rejects_undeclared_and_utf16() {
        assert!(matches!(
            decode_text(&[0x3c, 0x70, 0xff, 0xfe, 0x3e]),
            Err(DocumentError::Encoding(_))
        ));
        assert!(matches!(
            decode_text(&[0xff, 0xfe, 0x3c, 0x00]),
            Err(DocumentError::Encoding(_))
        ));
    }
}
