//! Text normalization for identity comparisons.
//!
//! Legacy spreadsheets mix accents, casing, and punctuation freely
//! ("José Pérez-García" vs "jose perez garcia"). Every comparison in the
//! engine goes through one of these three folds.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// NFD-decompose and drop combining marks ("Ático" → "Atico").
fn strip_marks(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent-stripped, lowercased, every run of non `[a-z0-9]` collapsed to a
/// single space, trimmed. Empty or whitespace-only input yields `""`.
pub fn canonical(text: &str) -> String {
    let folded = strip_marks(text).to_lowercase();
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `canonical` with all whitespace removed. This is the "compact key" used
/// for identity equality (tax ids, legacy codes, emails).
pub fn compact(text: &str) -> String {
    canonical(text).split_whitespace().collect()
}

/// Accent-stripped uppercase, punctuation preserved. The hint grammar's
/// regexes are written against this form.
pub fn upper_no_accent(text: &str) -> String {
    strip_marks(text).to_uppercase()
}
