//! Text normalization used for every comparison in the extractor.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize text for comparison.
///
/// Applies NFKC so decorative glyphs (mathematical bold, full-width, ...)
/// collapse to their plain letters, then collapses whitespace runs to single
/// spaces and trims. Normalizing an already normalized string is a no-op.
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    collapse_whitespace(&composed)
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
