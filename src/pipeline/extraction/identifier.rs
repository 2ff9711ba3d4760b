//! Document identifier extraction from recognized text.
//!
//! Scanned BAPP sheets print their serial after a "Nomor" label, e.g.
//! `Nomor : 0123/BAPP-TIK/2025` or `NOMOR: ABC123`. The identifier is the
//! first run of uppercase letters and digits following the label; OCR noise
//! (colons, dots, dashes, stray spaces) between label and value is skipped.

use std::sync::LazyLock;

use regex::Regex;

/// Case-insensitive label, any non-alphanumeric separators, then the
/// uppercase/digit run. The run ends at the first character outside
/// `[A-Z0-9]`; OCR noise glued to the label (`lNomor`) still matches.
static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:nomor)[^A-Za-z0-9]*([A-Z0-9]+)").unwrap()
});

/// Return the first identifier found in `text`, or `None` when no
/// labelled identifier is present.
pub fn extract_identifier(text: &str) -> Option<String> {
    IDENTIFIER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find(|m| !opens_capitalized_word(text, m))
        .map(|m| m.as_str().to_string())
}

/// A lone capital followed by lowercase is the start of a word ("Nomor
/// Induk Sekolah"), not a serial.
fn opens_capitalized_word(text: &str, m: &regex::Match<'_>) -> bool {
    let mut run = m.as_str().chars();
    let single_letter = matches!((run.next(), run.next()), (Some(c), None) if c.is_ascii_uppercase());
    single_letter && text[m.end()..].chars().next().is_some_and(char::is_lowercase)
}
