//! Per-cell evaluation: retrieve evidence, score it, persist the result.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::error::PipelineError;
use super::state::Stage;
use crate::knowledge::{PainPointTable, ScoreTable};
use crate::retrieval::Retriever;
use crate::scoring::{ComprehensionResult, ComprehensionScorer, ScoringError};
use crate::storage::{ComprehensionRecord, Persistence};

/// Result of evaluating one (student, concept) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellOutcome {
    pub student: String,
    pub concept: String,
    pub result: ComprehensionResult,
    /// The grader output was unparsable and a zero score was substituted.
    pub degraded: bool,
}

/// Evaluates every student x concept cell and folds the results into
/// score and pain point tables.
///
/// Each cell is written to persistence as soon as it is scored. Unparsable
/// grader output degrades only that cell; any other collaborator failure
/// aborts the evaluation.
pub struct ComprehensionAggregator {
    retriever: Arc<dyn Retriever>,
    scorer: Arc<dyn ComprehensionScorer>,
    persistence: Arc<dyn Persistence>,
    evidence_bound: usize,
    limiter: Arc<Semaphore>,
}

impl ComprehensionAggregator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        scorer: Arc<dyn ComprehensionScorer>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            retriever,
            scorer,
            persistence,
            evidence_bound: 6,
            limiter: Arc::new(Semaphore::new(1)),
        }
    }

    /// Sets the number of evidence snippets retrieved per cell.
    pub fn with_evidence_bound(mut self, bound: usize) -> Self {
        self.evidence_bound = bound;
        self
    }

    /// Sets how many cells may be evaluated at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    /// Evaluates all cells, students outer and concepts inner.
    pub async fn evaluate(
        &self,
        students: &[String],
        concepts: &[String],
    ) -> Result<(ScoreTable, PainPointTable), PipelineError> {
        let cells = students.iter().flat_map(|student| {
            concepts
                .iter()
                .map(move |concept| self.evaluate_cell(student, concept))
        });

        let outcomes = futures::future::try_join_all(cells).await?;

        let mut scores = ScoreTable::new();
        let mut pain_points = PainPointTable::new();
        for student in students {
            scores.entry(student.clone()).or_default();
            pain_points.entry(student.clone()).or_default();
        }
        for outcome in outcomes {
            if let Some(row) = scores.get_mut(&outcome.student) {
                row.insert(outcome.concept.clone(), outcome.result.score);
            }
            if let Some(row) = pain_points.get_mut(&outcome.student) {
                row.insert(outcome.concept, outcome.result.pain_points);
            }
        }

        Ok((scores, pain_points))
    }

    /// Evaluates one cell and persists it.
    pub async fn evaluate_cell(
        &self,
        student: &str,
        concept: &str,
    ) -> Result<CellOutcome, PipelineError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Evaluate, "scheduler", e))?;

        let snippets = self
            .retriever
            .student_evidence(student, concept, self.evidence_bound)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Evaluate, "retrieval", e))?;

        let (result, degraded) = match self.scorer.score(student, concept, &snippets).await {
            Ok(result) => (result, false),
            Err(ScoringError::Malformed(reason)) => {
                warn!(
                    student = %student,
                    concept = %concept,
                    reason = %reason,
                    "Grader output unparsable, scoring cell as 0"
                );
                (ComprehensionResult::unparsable(), true)
            }
            Err(e @ ScoringError::Unavailable(_)) => {
                return Err(PipelineError::stage_failed(Stage::Evaluate, "scorer", e));
            }
        };

        let record = ComprehensionRecord {
            student: student.to_string(),
            concept: concept.to_string(),
            score: result.score,
            pain_points: result.pain_points.clone(),
        };
        let inserted = self
            .persistence
            .insert_comprehension_if_absent(&record)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Evaluate, "persistence", e))?;

        debug!(
            student = %student,
            concept = %concept,
            score = result.score,
            snippets = snippets.len(),
            inserted,
            "Cell evaluated"
        );

        Ok(CellOutcome {
            student: student.to_string(),
            concept: concept.to_string(),
            result,
            degraded,
        })
    }
}
