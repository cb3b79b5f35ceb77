//! Text normalization shared by scoring and excerpting.

use std::collections::HashSet;

/// Lowercase, replace everything outside `[a-z0-9]` and whitespace with a
/// space, then split on whitespace runs. Empty pieces are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    normalized.split_whitespace().map(str::to_owned).collect()
}

/// Split on whitespace runs that directly follow `.`, `!` or `?`.
///
/// Delimiters stay attached to their sentence. Text after the last
/// delimiter (possibly empty) is the final piece.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&text[start..idx]);
            let mut next_start = text.len();
            while let Some(&(i, ch)) = chars.peek() {
                if ch.is_whitespace() {
                    chars.next();
                } else {
                    next_start = i;
                    break;
                }
            }
            start = next_start;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    sentences.push(&text[start..]);
    sentences
}

/// The first sentence of `content` sharing a token with `terms`, else the
/// first sentence, trimmed.
pub fn build_excerpt(content: &str, terms: &HashSet<String>) -> String {
    let sentences = split_sentences(content);
    sentences
        .iter()
        .find(|sentence| tokenize(sentence).iter().any(|token| terms.contains(token)))
        .or_else(|| sentences.first())
        .map(|sentence| sentence.trim().to_string())
        .unwrap_or_default()
}
