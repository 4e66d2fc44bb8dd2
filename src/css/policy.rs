//! The writing-mode rewrite policy.
//!
//! Maps a declaration's property and leading keyword to an [`Action`].
//! The table is static: nothing here depends on the content being fixed.

/// Replacement keyword for vertical `writing-mode` values.
pub const HORIZONTAL: &str = "horizontal-tb";

/// Keywords that put text into a vertical block flow.
///
/// `tb-rl`, `tb-lr` and `tb` are the SVG 1.1 / IE spellings still found
/// in older Japanese stylesheets.
const VERTICAL_MODES: &[&str] = &[
    "vertical-rl",
    "vertical-lr",
    "sideways-rl",
    "sideways-lr",
    "tb-rl",
    "tb-lr",
    "tb",
];

/// A single `property: value` pair from a rule body or inline style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// What to do with one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep the declaration verbatim.
    Unchanged,
    /// Swap the leading keyword for the given one.
    Replace(&'static str),
    /// Drop the declaration entirely.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    WritingMode,
    PrefixedWritingMode,
    TextOrientation,
    Other,
}

fn property_kind(property: &str) -> PropertyKind {
    let name = property.trim().to_ascii_lowercase();

    if name == "writing-mode" {
        PropertyKind::WritingMode
    } else if is_vendor_prefixed(&name, "writing-mode") {
        PropertyKind::PrefixedWritingMode
    } else if name == "text-orientation" || is_vendor_prefixed(&name, "text-orientation") {
        PropertyKind::TextOrientation
    } else {
        PropertyKind::Other
    }
}

/// `-webkit-writing-mode`, `-epub-writing-mode`, `-ms-writing-mode`, ...
fn is_vendor_prefixed(name: &str, base: &str) -> bool {
    let Some(prefix) = name.strip_suffix(base).and_then(|p| p.strip_suffix('-')) else {
        return false;
    };
    match prefix.strip_prefix('-') {
        Some(vendor) => !vendor.is_empty() && vendor.bytes().all(|b| b.is_ascii_alphanumeric()),
        None => false,
    }
}

/// Whether a writing-mode keyword denotes vertical text.
pub fn is_vertical(keyword: &str) -> bool {
    VERTICAL_MODES
        .iter()
        .any(|mode| keyword.eq_ignore_ascii_case(mode))
}

/// Decide the action for a property and the leading keyword of its value.
pub(crate) fn action_for(property: &str, keyword: &str) -> Action {
    match property_kind(property) {
        PropertyKind::WritingMode if is_vertical(keyword) => Action::Replace(HORIZONTAL),
        PropertyKind::PrefixedWritingMode if is_vertical(keyword) => Action::Remove,
        PropertyKind::TextOrientation if keyword.eq_ignore_ascii_case("upright") => {
            Action::Remove
        }
        _ => Action::Unchanged,
    }
}

/// Classify a declaration given as plain strings.
pub fn classify(property: &str, value: &str) -> Action {
    action_for(property, leading_keyword(value).1)
}

/// Returns the byte offset and text of the first keyword in a value.
fn leading_keyword(value: &str) -> (usize, &str) {
    let start = value.len() - value.trim_start().len();
    let rest = &value[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '!' || c == ';')
        .unwrap_or(rest.len());
    (start, &rest[..end])
}

/// Apply the policy to a declaration list.
///
/// Returns the surviving declarations in their original order and whether
/// anything was replaced or removed.
pub fn rewrite(declarations: &[Declaration]) -> (Vec<Declaration>, bool) {
    let mut changed = false;
    let mut result = Vec::with_capacity(declarations.len());

    for decl in declarations {
        match classify(&decl.property, &decl.value) {
            Action::Unchanged => result.push(decl.clone()),
            Action::Replace(keyword) => {
                let (start, old) = leading_keyword(&decl.value);
                let mut value = decl.value.clone();
                value.replace_range(start..start + old.len(), keyword);
                result.push(Declaration {
                    property: decl.property.clone(),
                    value,
                });
                changed = true;
            }
            Action::Remove => changed = true,
        }
    }

    (result, changed)
}
