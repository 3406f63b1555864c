//! Pipeline state threaded through the stages.
//!
//! Every derived field is written exactly once by the stage that owns it.
//! Setters refuse to overwrite and getters fail with a precondition error
//! when read before the owning stage ran, so a stage can neither skip ahead
//! nor clobber an earlier stage's output.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PipelineError;
use crate::knowledge::{PainPointTable, ScoreTable, StudyGroups};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Evaluate,
    Report,
    KnowledgeGraphAndGroups,
    LessonPlans,
    Homework,
    Done,
}

impl Stage {
    /// All working stages in order, `Done` excluded.
    pub const SEQUENCE: [Stage; 5] = [
        Stage::Evaluate,
        Stage::Report,
        Stage::KnowledgeGraphAndGroups,
        Stage::LessonPlans,
        Stage::Homework,
    ];

    /// The stage that runs after this one.
    pub fn next(self) -> Stage {
        match self {
            Stage::Evaluate => Stage::Report,
            Stage::Report => Stage::KnowledgeGraphAndGroups,
            Stage::KnowledgeGraphAndGroups => Stage::LessonPlans,
            Stage::LessonPlans => Stage::Homework,
            Stage::Homework | Stage::Done => Stage::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Evaluate => "evaluate",
            Stage::Report => "report",
            Stage::KnowledgeGraphAndGroups => "knowledge_graph_and_groups",
            Stage::LessonPlans => "lesson_plans",
            Stage::Homework => "homework",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text blobs keyed by student or concept.
pub type TextTable = BTreeMap<String, String>;

/// Mutable-once record of one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    students: Vec<String>,
    concepts: Vec<String>,
    scores: Option<ScoreTable>,
    pain_points: Option<PainPointTable>,
    reports: Option<TextTable>,
    groups: Option<StudyGroups>,
    lesson_plans: Option<TextTable>,
    homework: Option<TextTable>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, stage: Stage, field: &str) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::precondition(
            stage,
            format!("{} already written", field),
        ));
    }
    *slot = Some(value);
    Ok(())
}

fn require<'a, T>(slot: &'a Option<T>, stage: Stage, field: &str) -> Result<&'a T, PipelineError> {
    slot.as_ref()
        .ok_or_else(|| PipelineError::precondition(stage, format!("{} not populated", field)))
}

impl PipelineState {
    /// Fresh state seeded with the cohort.
    pub fn new(students: Vec<String>, concepts: Vec<String>) -> Self {
        Self {
            students,
            concepts,
            ..Self::default()
        }
    }

    pub fn students(&self) -> &[String] {
        &self.students
    }

    pub fn concepts(&self) -> &[String] {
        &self.concepts
    }

    /// Scores, required by `stage`.
    pub fn scores(&self, stage: Stage) -> Result<&ScoreTable, PipelineError> {
        require(&self.scores, stage, "scores")
    }

    /// Pain points, required by `stage`.
    pub fn pain_points(&self, stage: Stage) -> Result<&PainPointTable, PipelineError> {
        require(&self.pain_points, stage, "pain_points")
    }

    pub fn reports(&self, stage: Stage) -> Result<&TextTable, PipelineError> {
        require(&self.reports, stage, "reports")
    }

    pub fn groups(&self, stage: Stage) -> Result<&StudyGroups, PipelineError> {
        require(&self.groups, stage, "groups")
    }

    pub fn lesson_plans(&self, stage: Stage) -> Result<&TextTable, PipelineError> {
        require(&self.lesson_plans, stage, "lesson_plans")
    }

    pub fn homework(&self, stage: Stage) -> Result<&TextTable, PipelineError> {
        require(&self.homework, stage, "homework")
    }

    /// Checks that scores and pain points cover every (student, concept) cell.
    pub fn ensure_evaluated(&self, stage: Stage) -> Result<(), PipelineError> {
        let scores = self.scores(stage)?;
        let pain_points = self.pain_points(stage)?;
        for student in &self.students {
            for concept in &self.concepts {
                let scored = scores.get(student).is_some_and(|r| r.contains_key(concept));
                let diagnosed = pain_points
                    .get(student)
                    .is_some_and(|r| r.contains_key(concept));
                if !scored || !diagnosed {
                    return Err(PipelineError::precondition(
                        stage,
                        format!("no evaluation for ({}, {})", student, concept),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn with_evaluation(
        mut self,
        scores: ScoreTable,
        pain_points: PainPointTable,
    ) -> Result<Self, PipelineError> {
        set_once(&mut self.scores, scores, Stage::Evaluate, "scores")?;
        set_once(&mut self.pain_points, pain_points, Stage::Evaluate, "pain_points")?;
        Ok(self)
    }

    pub fn with_reports(mut self, reports: TextTable) -> Result<Self, PipelineError> {
        set_once(&mut self.reports, reports, Stage::Report, "reports")?;
        Ok(self)
    }

    pub fn with_groups(mut self, groups: StudyGroups) -> Result<Self, PipelineError> {
        set_once(&mut self.groups, groups, Stage::KnowledgeGraphAndGroups, "groups")?;
        Ok(self)
    }

    pub fn with_lesson_plans(mut self, plans: TextTable) -> Result<Self, PipelineError> {
        set_once(&mut self.lesson_plans, plans, Stage::LessonPlans, "lesson_plans")?;
        Ok(self)
    }

    pub fn with_homework(mut self, homework: TextTable) -> Result<Self, PipelineError> {
        set_once(&mut self.homework, homework, Stage::Homework, "homework")?;
        Ok(self)
    }

    /// Converts a completed state into the terminal snapshot.
    pub fn into_output(
        self,
        run_id: Uuid,
        timings: Vec<StageTiming>,
    ) -> Result<PipelineOutput, PipelineError> {
        let missing = |field: &str| PipelineError::precondition(Stage::Done, format!("{} not populated", field));
        Ok(PipelineOutput {
            run_id,
            students: self.students,
            concepts: self.concepts,
            scores: self.scores.ok_or_else(|| missing("scores"))?,
            pain_points: self.pain_points.ok_or_else(|| missing("pain_points"))?,
            reports: self.reports.ok_or_else(|| missing("reports"))?,
            groups: self.groups.ok_or_else(|| missing("groups"))?,
            lesson_plans: self.lesson_plans.ok_or_else(|| missing("lesson_plans"))?,
            homework: self.homework.ok_or_else(|| missing("homework"))?,
            timings,
        })
    }
}

/// Wall-clock duration of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub millis: u64,
}

/// Final snapshot of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    pub students: Vec<String>,
    pub concepts: Vec<String>,
    pub scores: ScoreTable,
    pub pain_points: PainPointTable,
    pub reports: TextTable,
    pub groups: StudyGroups,
    pub lesson_plans: TextTable,
    pub homework: TextTable,
    pub timings: Vec<StageTiming>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn evaluated() -> PipelineState {
        let mut scores = ScoreTable::new();
        let mut pains = PainPointTable::new();
        for s in ["A", "B"] {
            scores
                .entry(s.to_string())
                .or_default()
                .insert("X".to_string(), 50.0);
            pains
                .entry(s.to_string())
                .or_default()
                .insert("X".to_string(), Vec::new());
        }
        PipelineState::new(names(&["A", "B"]), names(&["X"]))
            .with_evaluation(scores, pains)
            .expect("evaluation")
    }

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Evaluate;
        let mut seen = vec![stage];
        while stage != Stage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(&seen[..5], &Stage::SEQUENCE[..]);
        assert_eq!(seen.last(), Some(&Stage::Done));
        assert_eq!(Stage::KnowledgeGraphAndGroups.to_string(), "knowledge_graph_and_groups");
    }

    #[test]
    fn test_reading_before_write_is_precondition_error() {
        let state = PipelineState::new(names(&["A"]), names(&["X"]));
        let err = state.scores(Stage::Report).unwrap_err();
        match err {
            PipelineError::Precondition { stage, reason } => {
                assert_eq!(stage, Stage::Report);
                assert!(reason.contains("scores"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_fields_are_write_once() {
        let state = evaluated();
        let err = state
            .with_evaluation(ScoreTable::new(), PainPointTable::new())
            .unwrap_err();
        assert!(err.to_string().contains("already written"));
    }

    #[test]
    fn test_ensure_evaluated_detects_missing_cell() {
        assert!(evaluated().ensure_evaluated(Stage::Report).is_ok());

        let mut scores = ScoreTable::new();
        scores
            .entry("A".to_string())
            .or_default()
            .insert("X".to_string(), 10.0);
        let state = PipelineState::new(names(&["A", "B"]), names(&["X"]))
            .with_evaluation(scores, PainPointTable::new())
            .expect("evaluation");
        let err = state.ensure_evaluated(Stage::Report).unwrap_err();
        assert!(err.to_string().contains("(A, X)"));
    }

    #[test]
    fn test_into_output_requires_all_fields() {
        let state = evaluated();
        assert!(state.clone().into_output(Uuid::new_v4(), Vec::new()).is_err());

        let output = state
            .with_reports(TextTable::new())
            .and_then(|s| s.with_groups(StudyGroups::new()))
            .and_then(|s| s.with_lesson_plans(TextTable::new()))
            .and_then(|s| s.with_homework(TextTable::new()))
            .and_then(|s| s.into_output(Uuid::new_v4(), Vec::new()))
            .expect("output");
        assert_eq!(output.students, names(&["A", "B"]));

        let json = serde_json::to_value(&output).expect("serialize");
        assert_eq!(json["scores"]["A"]["X"], 50.0);
    }
}
