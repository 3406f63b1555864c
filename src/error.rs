//! Error types shared across comprende subsystems.
//!
//! Errors owned by a single subsystem live next to it (`ScoringError`,
//! `DatabaseError`, `ConfigError`, `PipelineError`). The enums here are the
//! ones more than one module needs:
//! - LLM API interactions (scorer, content generator)
//! - Snippet retrieval from vector indexes

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: COMPRENDE_API_KEY or OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP client could not be built: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned no content")]
    EmptyResponse,
}

/// Errors that can occur while retrieving context snippets.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The index cannot apply metadata filters; callers may broaden and post-filter.
    #[error("Metadata filtering is not supported by index '{0}'")]
    FilterUnsupported(String),

    #[error("Vector search failed: {0}")]
    SearchFailed(String),

    #[error("Ingestion failed for '{path}': {reason}")]
    IngestionFailed { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::ApiError {
            code: 503,
            message: "overloaded".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));

        assert!(LlmError::MissingApiKey.to_string().contains("API key"));
    }

    #[test]
    fn test_retrieval_error_display() {
        let err = RetrievalError::FilterUnsupported("homework".to_string());
        assert!(err.to_string().contains("homework"));

        let err = RetrievalError::IngestionFailed {
            path: "notes/a.txt".to_string(),
            reason: "not utf-8".to_string(),
        };
        assert!(err.to_string().contains("notes/a.txt"));
        assert!(err.to_string().contains("not utf-8"));
    }
}
