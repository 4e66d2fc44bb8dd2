//! Shared helpers for building EPUB archives in memory.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:5b0c3a0e-3c47-4f6b-9a53-0d1f2e7f9c11</dc:identifier>
    <dc:title>月の裏側</dc:title>
    <dc:language>zh</dc:language>
  </metadata>
  <manifest>
    <item id="css" href="styles/book.css" media-type="text/css"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.html" media-type="text/html"/>
    <item id="cover" href="images/cover.png" media-type="image/png"/>
  </manifest>
  <spine page-progression-direction="rtl">
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

pub const BOOK_CSS: &str = r#"@charset "utf-8";
html {
  -epub-writing-mode: vertical-rl;
  -webkit-writing-mode: vertical-rl;
  writing-mode: vertical-rl;
}
p { text-indent: 1em; text-orientation: upright; }
"#;

pub const CHAPTER_1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="zh">
<head>
<title>第一章</title>
<link rel="stylesheet" type="text/css" href="../styles/book.css"/>
</head>
<body>
<p>月光照在<span style="writing-mode: vertical-rl;">窗台</span>上。</p>
</body>
</html>
"#;

pub const CHAPTER_2: &str = "<html><head><meta charset=utf-8><title>第二章</title></head>\n\
<body><div style=\"-webkit-writing-mode:vertical-rl\">夜色<br>渐深</div></body></html>\n";

/// A few bytes that look nothing like text.
pub const COVER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
];

/// One entry of a test archive.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub data: Vec<u8>,
    pub method: CompressionMethod,
}

/// Builds EPUB archives entry by entry.
#[derive(Debug, Clone, Default)]
pub struct EpubBuilder {
    entries: Vec<Entry>,
}

impl EpubBuilder {
    /// An archive holding only `mimetype` and `META-INF/container.xml`.
    pub fn new() -> Self {
        Self::default()
            .stored("mimetype", b"application/epub+zip")
            .deflated("META-INF/container.xml", CONTAINER_XML.as_bytes())
    }

    /// A small vertically written book with two chapters.
    pub fn vertical_book() -> Self {
        Self::new()
            .deflated("OEBPS/content.opf", CONTENT_OPF.as_bytes())
            .deflated("OEBPS/styles/book.css", BOOK_CSS.as_bytes())
            .deflated("OEBPS/text/ch1.xhtml", CHAPTER_1.as_bytes())
            .deflated("OEBPS/text/ch2.html", CHAPTER_2.as_bytes())
            .stored("OEBPS/images/cover.png", COVER_PNG)
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, CompressionMethod::Stored)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, CompressionMethod::Deflated)
    }

    pub fn entry(mut self, name: &str, data: &[u8], method: CompressionMethod) -> Self {
        self.entries.retain(|e| e.name != name);
        self.entries.push(Entry {
            name: name.to_string(),
            data: data.to_vec(),
            method,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(entry.method);
            zip.start_file(entry.name.as_str(), options).unwrap();
            zip.write_all(&entry.data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

/// Read every entry of an archive, decompressed, in archive order.
pub fn read_entries(bytes: &[u8]) -> Vec<Entry> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            Entry {
                name: file.name().to_string(),
                data,
                method: file.compression(),
            }
        })
        .collect()
}

/// The stored (possibly compressed) bytes of one entry.
pub fn raw_bytes(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let index = archive.index_for_name(name).unwrap();
    let mut file = archive.by_index_raw(index).unwrap();
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    data
}

pub fn entry_text(entries: &[Entry], name: &str) -> String {
    let entry = entries
        .iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("missing entry {name}"));
    String::from_utf8(entry.data.clone()).unwrap()
}

/// Set the "encrypted" flag on every entry, in both the local and the
/// central directory headers.
pub fn mark_encrypted(bytes: &mut [u8]) {
    const LOCAL: &[u8] = b"PK\x03\x04";
    const CENTRAL: &[u8] = b"PK\x01\x02";

    for i in 0..bytes.len().saturating_sub(4) {
        if &bytes[i..i + 4] == LOCAL {
            bytes[i + 6] |= 0x01;
        } else if &bytes[i..i + 4] == CENTRAL {
            bytes[i + 8] |= 0x01;
        }
    }
}

/// A one-entry stored archive whose central directory claims zip64 sizes
/// of 2^61 bytes for `data`.
pub fn oversized_entry(name: &str, data: &[u8]) -> Vec<u8> {
    const CLAIMED: u64 = 1 << 61;
    const DOS_DATE: u16 = 0x0021; // 1980-01-01

    let mut crc = flate2::Crc::new();
    crc.update(data);
    let crc = crc.sum();
    let len = data.len() as u32;
    let name_len = name.len() as u16;

    fn u16le(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    let mut out = Vec::new();

    // Local header with the real sizes
    out.extend_from_slice(b"PK\x03\x04");
    for v in [45, 0, 0, 0, DOS_DATE] {
        u16le(&mut out, v);
    }
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    u16le(&mut out, name_len);
    u16le(&mut out, 0);
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(data);

    // Central header deferring both sizes to the zip64 extra field
    let cd_offset = out.len() as u32;
    out.extend_from_slice(b"PK\x01\x02");
    for v in [45, 45, 0, 0, 0, DOS_DATE] {
        u16le(&mut out, v);
    }
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    for v in [name_len, 20, 0, 0, 0] {
        u16le(&mut out, v);
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // external attributes
    out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
    out.extend_from_slice(name.as_bytes());
    u16le(&mut out, 0x0001);
    u16le(&mut out, 16);
    out.extend_from_slice(&CLAIMED.to_le_bytes());
    out.extend_from_slice(&CLAIMED.to_le_bytes());
    let cd_size = out.len() as u32 - cd_offset;

    // End of central directory
    out.extend_from_slice(b"PK\x05\x06");
    for v in [0, 0, 1, 1] {
        u16le(&mut out, v);
    }
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    u16le(&mut out, 0);
    out
}
