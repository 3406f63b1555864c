//! Pipeline orchestrator.
//!
//! `PipelineOrchestrator` runs the fixed stage sequence
//! Evaluate → Report → KnowledgeGraphAndGroups → LessonPlans → Homework,
//! threading one `PipelineState` through it. Each stage reads only fields
//! written by earlier stages and writes its own. Any collaborator failure
//! aborts the run with an error naming the stage and collaborator.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use super::aggregator::ComprehensionAggregator;
use super::config::PipelineConfig;
use super::error::PipelineError;
use super::state::{PipelineOutput, PipelineState, Stage, StageTiming, TextTable};
use crate::generation::{ContentGenerator, ContentRequest};
use crate::knowledge::{
    student_weak_concepts, AwarenessGraph, StudyGroupBuilder, WeakConceptSelector,
};
use crate::prompts::{CONTEXT_SEPARATOR, NO_WEAK_CONCEPTS_HOMEWORK};
use crate::retrieval::Retriever;
use crate::scoring::ComprehensionScorer;
use crate::storage::Persistence;
use crate::utils::truncate_chars;

/// External capabilities the pipeline depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn Retriever>,
    pub scorer: Arc<dyn ComprehensionScorer>,
    pub generator: Arc<dyn ContentGenerator>,
    pub persistence: Arc<dyn Persistence>,
}

/// Runs the comprehension pipeline end to end.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    collaborators: Collaborators,
    aggregator: ComprehensionAggregator,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator after validating `config`.
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Result<Self, PipelineError> {
        config.validate()?;

        let aggregator = ComprehensionAggregator::new(
            collaborators.retriever.clone(),
            collaborators.scorer.clone(),
            collaborators.persistence.clone(),
        )
        .with_evidence_bound(config.retrieval.evidence)
        .with_max_concurrent(config.max_concurrent_evaluations);

        Ok(Self {
            config,
            collaborators,
            aggregator,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage and returns the completed snapshot.
    pub async fn run(&self) -> Result<PipelineOutput, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id);

        async move {
            info!(
                students = self.config.students.len(),
                concepts = self.config.concepts.len(),
                "Starting pipeline run"
            );

            let mut state =
                PipelineState::new(self.config.students.clone(), self.config.concepts.clone());
            let mut timings = Vec::with_capacity(Stage::SEQUENCE.len());

            for stage in Stage::SEQUENCE {
                let started = Instant::now();
                info!(stage = %stage, "Stage started");

                state = match self.run_stage(stage, state).await {
                    Ok(next) => next,
                    Err(e) => {
                        error!(stage = %stage, error = %e, "Stage failed, aborting run");
                        return Err(e);
                    }
                };

                let millis = started.elapsed().as_millis() as u64;
                info!(stage = %stage, millis, "Stage completed");
                timings.push(StageTiming { stage, millis });
            }

            let output = state.into_output(run_id, timings)?;
            info!(groups = output.groups.len(), "Pipeline run complete");
            Ok::<_, PipelineError>(output)
        }
        .instrument(span)
        .await
    }

    /// Runs a single stage on `state`.
    pub async fn run_stage(
        &self,
        stage: Stage,
        state: PipelineState,
    ) -> Result<PipelineState, PipelineError> {
        match stage {
            Stage::Evaluate => self.evaluate(state).await,
            Stage::Report => self.report(state).await,
            Stage::KnowledgeGraphAndGroups => self.knowledge_graph_and_groups(state).await,
            Stage::LessonPlans => self.lesson_plans(state).await,
            Stage::Homework => self.homework(state).await,
            Stage::Done => Ok(state),
        }
    }

    /// Scores every (student, concept) cell.
    pub async fn evaluate(&self, state: PipelineState) -> Result<PipelineState, PipelineError> {
        if state.students().is_empty() {
            return Err(PipelineError::precondition(Stage::Evaluate, "students is empty"));
        }
        if state.concepts().is_empty() {
            return Err(PipelineError::precondition(Stage::Evaluate, "concepts is empty"));
        }

        let (scores, pain_points) = self
            .aggregator
            .evaluate(state.students(), state.concepts())
            .await?;
        state.with_evaluation(scores, pain_points)
    }

    /// Generates one report per student.
    pub async fn report(&self, state: PipelineState) -> Result<PipelineState, PipelineError> {
        let stage = Stage::Report;
        state.ensure_evaluated(stage)?;
        let scores = state.scores(stage)?;
        let pain_points = state.pain_points(stage)?;

        let mut reports = TextTable::new();
        for student in state.students() {
            let request = ContentRequest::report(
                student,
                &scores.get(student).cloned().unwrap_or_default(),
                &pain_points.get(student).cloned().unwrap_or_default(),
            )
            .map_err(|e| PipelineError::stage_failed(stage, "serializer", e))?;

            let report = self.generate(stage, &request).await?;
            debug!(student = %student, chars = report.len(), "Report generated");
            reports.insert(student.clone(), report);
        }

        state.with_reports(reports)
    }

    /// Forms study groups, then persists identities and the awareness and
    /// group snapshots.
    pub async fn knowledge_graph_and_groups(
        &self,
        state: PipelineState,
    ) -> Result<PipelineState, PipelineError> {
        let stage = Stage::KnowledgeGraphAndGroups;
        state.ensure_evaluated(stage)?;
        let scores = state.scores(stage)?;
        let persistence = &self.collaborators.persistence;

        persistence
            .upsert_identities(state.students(), state.concepts())
            .await
            .map_err(|e| PipelineError::stage_failed(stage, "persistence", e))?;

        let graph = AwarenessGraph::new(
            scores,
            state.students(),
            state.concepts(),
            self.config.awareness_threshold,
        );
        info!(
            edges = graph.edges().len(),
            threshold = graph.threshold(),
            "Awareness graph built"
        );

        let groups = StudyGroupBuilder::new(self.config.target_group_size)
            .with_awareness_threshold(self.config.awareness_threshold)
            .build(scores, state.students(), state.concepts());

        persistence
            .replace_knowledge_snapshot(scores, &groups)
            .await
            .map_err(|e| PipelineError::stage_failed(stage, "persistence", e))?;
        info!(groups = groups.len(), "Study groups formed");

        state.with_groups(groups)
    }

    /// Generates a lesson plan for every cohort-wide weak concept.
    pub async fn lesson_plans(&self, state: PipelineState) -> Result<PipelineState, PipelineError> {
        let stage = Stage::LessonPlans;
        let scores = state.scores(stage)?;

        let weak = WeakConceptSelector::new(self.config.mastery_threshold).select(
            scores,
            state.students(),
            state.concepts(),
        );
        info!(weak_concepts = ?weak, "Weak concepts selected");

        let mut plans = TextTable::new();
        for concept in &weak {
            let context = self
                .lesson_context(
                    stage,
                    concept,
                    self.config.retrieval.lesson_context,
                    self.config.snippets.lesson_chars,
                )
                .await?
                .join(CONTEXT_SEPARATOR);
            let request = ContentRequest::LessonPlan {
                concepts: vec![concept.clone()],
                context,
            };
            let plan = self.generate(stage, &request).await?;
            plans.insert(concept.clone(), plan);
        }

        self.collaborators
            .persistence
            .replace_lesson_plans(&plans)
            .await
            .map_err(|e| PipelineError::stage_failed(stage, "persistence", e))?;

        state.with_lesson_plans(plans)
    }

    /// Generates homework per student from that student's own weak concepts.
    pub async fn homework(&self, state: PipelineState) -> Result<PipelineState, PipelineError> {
        let stage = Stage::Homework;
        let scores = state.scores(stage)?;

        let mut homework = TextTable::new();
        for student in state.students() {
            let weak = student_weak_concepts(
                scores,
                student,
                state.concepts(),
                self.config.homework_threshold,
            );
            if weak.is_empty() {
                debug!(student = %student, "No weak concepts, skipping generation");
                homework.insert(student.clone(), NO_WEAK_CONCEPTS_HOMEWORK.to_string());
                continue;
            }

            let mut context = Vec::new();
            for concept in &weak {
                context.extend(
                    self.lesson_context(
                        stage,
                        concept,
                        self.config.retrieval.homework_context,
                        self.config.snippets.homework_chars,
                    )
                    .await?,
                );
            }

            let request = ContentRequest::Homework {
                student: student.clone(),
                weak_concepts: weak,
                context: context.join(CONTEXT_SEPARATOR),
            };
            let text = self.generate(stage, &request).await?;
            homework.insert(student.clone(), text);
        }

        self.collaborators
            .persistence
            .replace_homework(&homework)
            .await
            .map_err(|e| PipelineError::stage_failed(stage, "persistence", e))?;

        state.with_homework(homework)
    }

    async fn lesson_context(
        &self,
        stage: Stage,
        concept: &str,
        bound: usize,
        max_chars: usize,
    ) -> Result<Vec<String>, PipelineError> {
        let snippets = self
            .collaborators
            .retriever
            .lesson_context(concept, bound)
            .await
            .map_err(|e| PipelineError::stage_failed(stage, "retrieval", e))?;

        Ok(snippets
            .iter()
            .map(|s| truncate_chars(&s.text, max_chars))
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn generate(
        &self,
        stage: Stage,
        request: &ContentRequest,
    ) -> Result<String, PipelineError> {
        self.collaborators
            .generator
            .generate(request)
            .await
            .map_err(|e| PipelineError::stage_failed(stage, "generator", e))
    }
}
