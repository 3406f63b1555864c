//! Comprehension scoring.
//!
//! The `ComprehensionScorer` capability turns retrieved evidence for one
//! (student, concept) cell into a score and a list of pain points.
//! `LlmScorer` asks a chat model for JSON and parses it leniently:
//! missing fields default, scores are clamped to [0, 100], and output with
//! no JSON object at all is reported as `ScoringError::Malformed` so the
//! aggregator can degrade that single cell.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::{complete, LlmProvider, DEFAULT_MODEL};
use crate::prompts::{build_scorer_prompt, SCORER_SYSTEM};
use crate::retrieval::Snippet;
use crate::utils::{truncate_chars, try_extract_json_object};

/// Pain point recorded for a cell whose grader output could not be parsed.
pub const PARSE_FAILURE_PAIN_POINT: &str = "Unable to parse grader output";

/// Errors from a scoring collaborator.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The grader answered, but not in the expected structure.
    #[error("Malformed grader output: {0}")]
    Malformed(String),

    /// The grader could not be reached or refused the request.
    #[error("Scorer unavailable: {0}")]
    Unavailable(#[from] LlmError),
}

/// Structured grader verdict for one (student, concept) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensionResult {
    /// Score in [0, 100].
    pub score: f64,
    pub pain_points: Vec<String>,
    /// Short quotes the grader based its verdict on.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl ComprehensionResult {
    pub fn new(score: f64, pain_points: Vec<String>) -> Self {
        Self {
            score: score.clamp(0.0, 100.0),
            pain_points,
            evidence: Vec::new(),
        }
    }

    /// Result substituted when grader output cannot be parsed.
    pub fn unparsable() -> Self {
        Self::new(0.0, vec![PARSE_FAILURE_PAIN_POINT.to_string()])
    }
}

/// Scoring capability.
#[async_trait]
pub trait ComprehensionScorer: Send + Sync {
    async fn score(
        &self,
        student: &str,
        concept: &str,
        snippets: &[Snippet],
    ) -> Result<ComprehensionResult, ScoringError>;
}

/// Formats snippets as `[source] text`, truncating text to `max_chars`.
pub fn format_evidence(snippets: &[Snippet], max_chars: usize) -> Vec<String> {
    snippets
        .iter()
        .map(|s| format!("[{}] {}", s.source_label, truncate_chars(&s.text, max_chars)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    pain_points: Option<Value>,
    #[serde(default)]
    evidence: Option<Value>,
}

fn value_to_score(value: Option<Value>) -> Result<f64, ScoringError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ScoringError::Malformed(format!("score out of range: {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScoringError::Malformed(format!("score is not numeric: {:?}", s))),
        Some(other) => Err(ScoringError::Malformed(format!(
            "score has unexpected type: {}",
            other
        ))),
    }
}

fn value_to_strings(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    }
}

/// Parses grader output into a `ComprehensionResult`.
pub fn parse_grader_output(raw: &str) -> Result<ComprehensionResult, ScoringError> {
    let extraction = try_extract_json_object(raw);
    let json = extraction.json().ok_or_else(|| {
        ScoringError::Malformed(format!(
            "no JSON object in grader output: {:?}",
            truncate_chars(raw.trim(), 80)
        ))
    })?;

    let verdict: RawVerdict =
        serde_json::from_str(json).map_err(|e| ScoringError::Malformed(e.to_string()))?;

    let score = value_to_score(verdict.score)?;
    if !score.is_finite() {
        return Err(ScoringError::Malformed("score is not finite".to_string()));
    }

    Ok(ComprehensionResult {
        score: score.clamp(0.0, 100.0),
        pain_points: value_to_strings(verdict.pain_points),
        evidence: value_to_strings(verdict.evidence),
    })
}

/// `ComprehensionScorer` backed by a chat model.
pub struct LlmScorer {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    snippet_chars: usize,
}

impl LlmScorer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            snippet_chars: 600,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the per-snippet character limit in the prompt.
    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }
}

#[async_trait]
impl ComprehensionScorer for LlmScorer {
    async fn score(
        &self,
        student: &str,
        concept: &str,
        snippets: &[Snippet],
    ) -> Result<ComprehensionResult, ScoringError> {
        let evidence = format_evidence(snippets, self.snippet_chars);
        let prompt = build_scorer_prompt(student, concept, &evidence);

        let raw = complete(
            self.llm.as_ref(),
            &self.model,
            self.temperature,
            SCORER_SYSTEM,
            prompt,
        )
        .await?;

        debug!(student = %student, concept = %concept, chars = raw.len(), "Grader responded");
        parse_grader_output(&raw)
    }
}
