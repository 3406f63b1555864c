//! Shared utility functions for comprende.

pub mod json_extraction;

pub use json_extraction::{find_matching_brace, try_extract_json_object, JsonExtractionResult};

/// Truncates `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
