//! EPUB archive repair.

mod entry;
mod package;
mod repair;

pub use entry::EntryKind;
pub use package::{Package, parse_container_xml, parse_manifest, resolve_href};
pub use repair::{RepairSummary, fix_epub, fix_epub_with, repair_archive};
