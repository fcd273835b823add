//! Canonicalization of raw path and slug strings into comparison keys.
//!
//! Every lookup structure in this crate stores and compares *normalized*
//! paths: NFC-composed, trimmed, lower-cased, with no leading or trailing
//! separators and no empty interior segments. Raw user input and stored
//! slugs both pass through [`normalize_path`] before touching the registry.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static EDGE_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/+|/+$").expect("edge separator pattern is valid")
});

static REPEATED_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/{2,}").expect("repeated separator pattern is valid")
});

/// Normalize a raw path into its canonical comparison key.
///
/// Separator-only or empty input normalizes to the empty string, which no
/// registry key ever uses.
pub fn normalize_path(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let composed: String = raw.trim().nfc().collect();
    let lowered = composed.to_lowercase();
    let trimmed = EDGE_SEPARATORS.replace_all(&lowered, "");
    REPEATED_SEPARATORS.replace_all(&trimmed, "/").into_owned()
}

/// Last non-empty segment of an already-normalized path, used by the
/// last-resort slug fallback. `None` for the empty path.
pub fn final_segment(normalized: &str) -> Option<&str> {
    normalized.rsplit('/').find(|segment| !segment.is_empty())
}
