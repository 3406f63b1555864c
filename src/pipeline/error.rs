//! Pipeline error types.

use thiserror::Error;

use super::config::ConfigError;
use super::state::Stage;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage was entered without the fields it depends on.
    #[error("Precondition failed for stage {stage}: {reason}")]
    Precondition { stage: Stage, reason: String },

    /// A collaborator call failed outright.
    #[error("Stage {stage} failed in {collaborator}: {source}")]
    StageFailed {
        stage: Stage,
        collaborator: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The run configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn precondition(stage: Stage, reason: impl Into<String>) -> Self {
        PipelineError::Precondition {
            stage,
            reason: reason.into(),
        }
    }

    pub fn stage_failed<E>(stage: Stage, collaborator: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PipelineError::StageFailed {
            stage,
            collaborator,
            source: Box::new(source),
        }
    }

    /// The stage the error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Precondition { stage, .. } | PipelineError::StageFailed { stage, .. } => {
                Some(*stage)
            }
            PipelineError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;

    #[test]
    fn test_stage_failed_names_stage_and_collaborator() {
        let err = PipelineError::stage_failed(
            Stage::LessonPlans,
            "generator",
            LlmError::RateLimited("slow down".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("lesson_plans"));
        assert!(msg.contains("generator"));
        assert!(msg.contains("slow down"));
        assert_eq!(err.stage(), Some(Stage::LessonPlans));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_precondition_display() {
        let err = PipelineError::precondition(Stage::Evaluate, "students is empty");
        assert_eq!(
            err.to_string(),
            "Precondition failed for stage evaluate: students is empty"
        );
    }
}
