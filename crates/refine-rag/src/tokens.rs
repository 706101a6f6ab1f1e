//! Token accounting shared by the node parser and the context packer
//!
//! A token is a Unicode word-boundary segment that is not pure whitespace.
//! Token `i` owns the bytes from its own start up to the start of token
//! `i + 1`, so slicing on token starts never drops or duplicates text.

use unicode_segmentation::UnicodeSegmentation;

/// Byte offset of every token in `text`
pub fn token_starts(text: &str) -> Vec<usize> {
    text.split_word_bound_indices()
        .filter(|(_, segment)| !segment.chars().all(char::is_whitespace))
        .map(|(offset, _)| offset)
        .collect()
}

/// Number of tokens in `text`
pub fn count_tokens(text: &str) -> usize {
    text.split_word_bounds()
        .filter(|segment| !segment.chars().all(char::is_whitespace))
        .count()
}

/// Split `text` into consecutive pieces of at most `max_tokens` tokens
///
/// The pieces concatenate back to `text`. Leading whitespace stays with the
/// first piece and trailing whitespace with the last.
pub fn split_by_tokens(text: &str, max_tokens: usize) -> Vec<&str> {
    let starts = token_starts(text);
    if max_tokens == 0 || starts.len() <= max_tokens {
        return vec![text];
    }

    let mut pieces = Vec::with_capacity(starts.len() / max_tokens + 1);
    let mut begin = 0usize;
    let mut token = max_tokens;
    while token < starts.len() {
        pieces.push(&text[begin..starts[token]]);
        begin = starts[token];
        token += max_tokens;
    }
    pieces.push(&text[begin..]);
    pieces
}
