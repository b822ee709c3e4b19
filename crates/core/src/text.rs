//! Text Normalization
//!
//! Canonical form used as the identity key for candidate questions and as the
//! basis of every substring/token comparison in the engine.

use std::collections::HashSet;

/// Normalize free text for matching.
///
/// Lowercases, turns line breaks and tabs into spaces, replaces everything
/// outside `[a-z0-9 ]` with a space, collapses whitespace runs and trims.
/// Empty input yields an empty string.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Token set of the normalized form of `text`.
pub fn tokens(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Token set of text that is already normalized.
pub fn normalized_tokens(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

/// Keep only the last `max_chars` characters of `text`.
///
/// Works on character boundaries so multi-byte input never panics.
pub fn clip_tail(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
