//! Writing-mode repair for CSS.
//!
//! - [`rewrite`]: the policy applied to a list of [`Declaration`]s
//! - [`rewrite_stylesheet`]: every rule of a stylesheet or `<style>` block
//! - [`rewrite_inline_style`]: a `style="..."` attribute value
//!
//! Unprefixed vertical `writing-mode` values become `horizontal-tb`;
//! vendor-prefixed vertical ones and `text-orientation: upright` are
//! dropped. Everything else is left exactly as written.

mod policy;
mod rewrite;


pub use policy::{Action, Declaration, HORIZONTAL, classify, is_vertical, rewrite};
pub use rewrite::{rewrite_inline_style, rewrite_stylesheet};
