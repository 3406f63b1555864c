//! JSON extraction for grader responses.
//!
//! Chat models asked for "JSON only" still wrap it in code fences, prepend a
//! sentence, or get cut off mid-object. Strategies, in order:
//! 1. The whole trimmed response parses as a JSON object
//! 2. The body of a fenced code block (```json or bare ```)
//! 3. The span from the first `{` to the last `}`
//! 4. Brace matching from each `{` until a candidate parses
//!
//! # Example
//!
//! ```
//! use comprende::utils::json_extraction::try_extract_json_object;
//!
//! let response = "Sure! {\"score\": 82, \"pain_points\": []}";
//! let json = try_extract_json_object(response).json().map(str::to_string);
//! assert_eq!(json.as_deref(), Some("{\"score\": 82, \"pain_points\": []}"));
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// A span that parses as a JSON object.
    Success(String),
    /// An object was opened but never closed.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
    },
    /// Nothing object-like in the response.
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    /// Returns the extracted JSON for the `Success` case.
    pub fn json(&self) -> Option<&str> {
        match self {
            JsonExtractionResult::Success(json) => Some(json),
            _ => None,
        }
    }
}

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").expect("static regex is valid")
    })
}

fn parses_as_object(candidate: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(candidate),
        Ok(serde_json::Value::Object(_))
    )
}

/// Extracts a JSON object from free-form model output.
pub fn try_extract_json_object(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    if parses_as_object(trimmed) {
        return JsonExtractionResult::Success(trimmed.to_string());
    }

    for captures in code_block_regex().captures_iter(trimmed) {
        if let Some(body) = captures.get(1) {
            let body = body.as_str().trim();
            if parses_as_object(body) {
                return JsonExtractionResult::Success(body.to_string());
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start && parses_as_object(&trimmed[start..=end]) {
            return JsonExtractionResult::Success(trimmed[start..=end].to_string());
        }
    }

    for (start, _) in trimmed.match_indices('{') {
        if let Some(len) = find_matching_brace(&trimmed[start..]) {
            let candidate = &trimmed[start..=start + len];
            if parses_as_object(candidate) {
                return JsonExtractionResult::Success(candidate.to_string());
            }
        }
    }

    match trimmed.find('{') {
        Some(start) => {
            let unclosed = unclosed_braces(&trimmed[start..]);
            if unclosed > 0 {
                JsonExtractionResult::Truncated {
                    partial_json: trimmed[start..].to_string(),
                    unclosed_braces: unclosed,
                }
            } else {
                JsonExtractionResult::NotFound
            }
        }
        None => JsonExtractionResult::NotFound,
    }
}

/// Returns the byte offset of the `}` closing the object that opens at
/// `s[0]`, honouring string literals and escapes.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    if !s.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Counts `{` left open at the end of `s`, ignoring braces inside strings.
fn unclosed_braces(s: &str) -> usize {
    let mut depth: isize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }

    depth.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let result = try_extract_json_object(r#"  {"score": 90}  "#);
        assert_eq!(result.json(), Some(r#"{"score": 90}"#));
    }

    #[test]
    fn test_fenced_block() {
        let content = "Here you go:\n```json\n{\"score\": 55, \"pain_points\": [\"off by one\"]}\n```\nThanks";
        let result = try_extract_json_object(content);
        assert!(result.is_success());
        assert!(result.json().unwrap_or_default().contains("off by one"));
    }

    #[test]
    fn test_object_after_prose() {
        let content = r#"The student did well. {"score": 72, "pain_points": []} Hope that helps."#;
        let result = try_extract_json_object(content);
        assert_eq!(result.json(), Some(r#"{"score": 72, "pain_points": []}"#));
    }

    #[test]
    fn test_braces_inside_strings() {
        let content = r#"{"score": 40, "pain_points": ["confuses {} with []"]}"#;
        assert_eq!(find_matching_brace(content), Some(content.len() - 1));
        assert!(try_extract_json_object(content).is_success());
    }

    #[test]
    fn test_two_objects_picks_parseable_one() {
        let content = r#"draft {not json} final {"score": 10}"#;
        let result = try_extract_json_object(content);
        assert_eq!(result.json(), Some(r#"{"score": 10}"#));
    }

    #[test]
    fn test_truncated() {
        let result = try_extract_json_object(r#"{"score": 80, "pain_points": ["a""#);
        match result {
            JsonExtractionResult::Truncated {
                unclosed_braces, ..
            } => assert_eq!(unclosed_braces, 1),
            other => panic!("expected truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found() {
        assert_eq!(
            try_extract_json_object("I cannot grade this."),
            JsonExtractionResult::NotFound
        );
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(!try_extract_json_object("[1, 2, 3]").is_success());
    }
}
