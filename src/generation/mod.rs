//! Content generation for reports, lesson plans and homework.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::{complete, LlmProvider, DEFAULT_MODEL};
use crate::prompts::{
    build_homework_prompt, build_lesson_prompt, build_report_prompt, HOMEWORK_SYSTEM,
    LESSON_SYSTEM, REPORT_SYSTEM,
};

/// Structured input for one piece of generated text.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentRequest {
    /// Per-student report over that student's results.
    Report {
        student: String,
        /// Pretty-printed JSON of the student's scores and pain points.
        results_json: String,
    },
    /// Remedial lesson plan for cohort-wide weak concepts.
    LessonPlan {
        concepts: Vec<String>,
        context: String,
    },
    /// Personalized homework for one student's weak concepts.
    Homework {
        student: String,
        weak_concepts: Vec<String>,
        context: String,
    },
}

impl ContentRequest {
    /// Builds a report request from one student's scores and pain points.
    pub fn report(
        student: &str,
        scores: &BTreeMap<String, f64>,
        pain_points: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, serde_json::Error> {
        let results_json = serde_json::to_string_pretty(&json!({
            "scores": scores,
            "pain_points": pain_points,
        }))?;
        Ok(ContentRequest::Report {
            student: student.to_string(),
            results_json,
        })
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentRequest::Report { .. } => "report",
            ContentRequest::LessonPlan { .. } => "lesson_plan",
            ContentRequest::Homework { .. } => "homework",
        }
    }

    fn prompts(&self) -> (&'static str, String) {
        match self {
            ContentRequest::Report {
                student,
                results_json,
            } => (REPORT_SYSTEM, build_report_prompt(student, results_json)),
            ContentRequest::LessonPlan { concepts, context } => {
                (LESSON_SYSTEM, build_lesson_prompt(concepts, context))
            }
            ContentRequest::Homework {
                student,
                weak_concepts,
                context,
            } => (
                HOMEWORK_SYSTEM,
                build_homework_prompt(student, weak_concepts, context),
            ),
        }
    }
}

/// Content-generation capability: structured context in, text out.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &ContentRequest) -> Result<String, LlmError>;
}

/// `ContentGenerator` backed by a chat model.
pub struct LlmContentGenerator {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
}

impl LlmContentGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
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
}

#[async_trait]
impl ContentGenerator for LlmContentGenerator {
    async fn generate(&self, request: &ContentRequest) -> Result<String, LlmError> {
        let (system, user) = request.prompts();
        complete(self.llm.as_ref(), &self.model, self.temperature, system, user).await
    }
}
