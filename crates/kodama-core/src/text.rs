//! Character-indexed string helpers.
//!
//! Cursor columns and trim budgets count characters, not bytes; these
//! helpers translate between the two without ever splitting a UTF-8
//! sequence.

/// Byte offset of the `n`-th character, clamped to the string length.
pub(crate) fn byte_at_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Number of characters in `s`.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `n` characters of `s`.
pub(crate) fn head_chars(s: &str, n: usize) -> &str {
    &s[..byte_at_char(s, n)]
}

/// The last `n` characters of `s`.
pub(crate) fn tail_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    &s[byte_at_char(s, len.saturating_sub(n))..]
}
