//! Engine configuration.

/// Switches for a repair run.
///
/// The default only touches writing-mode CSS, leaving the package
/// document byte-identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixOptions {
    /// Also flip the spine's `page-progression-direction` from `rtl` to `ltr`.
    pub page_progression: bool,
}

impl FixOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_progression(mut self, enabled: bool) -> Self {
        self.page_progression = enabled;
        self
    }
}
