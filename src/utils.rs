//! Text normalization helpers shared by the corpus stages.

use crate::constants::corpus::TRIM_CHARS;
use crate::types::CellText;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Insert a space before an uppercase letter glued to `.`, `?` or `!`.
pub fn decouple_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if ch.is_uppercase() && matches!(prev, Some('.' | '?' | '!')) {
            out.push(' ');
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

/// True when `text` holds at least one alphabetic character.
pub fn has_alphabetic(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}

/// Normalize one corpus cell; cells without letters become empty.
pub fn reformat_field(text: &str) -> CellText {
    let collapsed = normalize_inline_whitespace(text);
    let trimmed = collapsed.trim_matches(&TRIM_CHARS[..]);
    let decoupled = decouple_sentences(trimmed);
    if has_alphabetic(&decoupled) {
        decoupled
    } else {
        CellText::new()
    }
}
