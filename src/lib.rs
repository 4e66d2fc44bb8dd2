//! # yoko
//!
//! Repairs EPUB books that still carry vertical-writing CSS after being
//! machine-translated from Japanese into a horizontally written language.
//!
//! ## What gets changed
//!
//! - `writing-mode: vertical-rl` (and the other vertical modes) becomes
//!   `writing-mode: horizontal-tb`
//! - vendor-prefixed vertical writing modes and `text-orientation: upright`
//!   are removed
//! - every content document gets a small `<style>` block forcing
//!   horizontal layout and a CJK font stack
//!
//! Everything else in the archive is copied byte-for-byte.
//!
//! ## Quick Start
//!
//! ```no_run
//! // One file
//! yoko::fix_epub("novel.epub", "novel.fixed.epub")?;
//!
//! // Many files, written into a directory
//! let report = yoko::batch_fix(&["a.epub", "b.epub"], Some("fixed".as_ref()))?;
//! for failed in &report.failed_files {
//!     eprintln!("{}: {}", failed.path.display(), failed.reason);
//! }
//! # Ok::<(), yoko::Error>(())
//! ```
//!
//! ## Working with CSS directly
//!
//! ```
//! let css = "body { writing-mode: vertical-rl; text-orientation: upright; }";
//! assert_eq!(
//!     yoko::css::rewrite_stylesheet(css).as_deref(),
//!     Some("body { writing-mode: horizontal-tb; }")
//! );
//! ```

pub mod batch;
pub mod css;
pub mod document;
pub mod epub;
pub mod error;
pub mod options;
pub(crate) mod util;

pub use batch::{
    BatchFixer, BatchReport, FailedFile, OutputTarget, Progress, ProgressSnapshot, batch_fix,
};
pub use document::{DocumentError, MarkupKind, patch_document};
pub use epub::{RepairSummary, fix_epub, fix_epub_with, repair_archive};
pub use error::{Error, Result};
pub use options::FixOptions;
