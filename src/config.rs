//! Output settings for tree text.

/// Controls how tree documents and values are rendered as text.
///
/// Kept small and `Copy` so it can be passed by value through the writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TextConfig {
    /// Significant digits used by the precision-aware double writers.
    pub double_precision: usize,
    /// Spaces per nesting level. `None` renders the document on one line.
    pub indent: Option<usize>,
    /// Whether saved files start with an `<?xml version="1.0"?>` declaration.
    pub declaration: bool,
}

impl TextConfig {
    /// Default number of significant digits for doubles.
    pub const DEFAULT_PRECISION: usize = 10;

    /// A configuration producing indented, human-friendly output.
    pub fn pretty() -> Self {
        Self {
            indent: Some(2),
            ..Self::default()
        }
    }

    /// Returns a copy with a different double precision.
    pub fn with_precision(self, double_precision: usize) -> Self {
        Self {
            double_precision,
            ..self
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            double_precision: Self::DEFAULT_PRECISION,
            indent: None,
            declaration: true,
        }
    }
}
