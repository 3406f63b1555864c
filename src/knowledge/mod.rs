//! Derived knowledge over a score table.
//!
//! Everything here is a pure function of the scores, the student and
//! concept lists, and a threshold:
//! - `AwarenessGraph`: who is aware of what
//! - `WeakConceptSelector`: cohort-wide weak concepts by median score
//! - `student_weak_concepts`: per-student weak concepts
//! - `StudyGroupBuilder`: greedy maximum-coverage study groups

pub mod awareness;
pub mod grouping;
pub mod weak_concepts;

use std::collections::BTreeMap;

pub use awareness::AwarenessGraph;
pub use grouping::{GroupFormation, StudyGroupBuilder, StudyGroups};
pub use weak_concepts::{median_score, student_weak_concepts, WeakConceptSelector};

/// Scores by student, then concept. Values are in [0, 100].
pub type ScoreTable = BTreeMap<String, BTreeMap<String, f64>>;

/// Pain points by student, then concept.
pub type PainPointTable = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Default score at or above which a student is aware of a concept.
pub const DEFAULT_AWARENESS_THRESHOLD: f64 = 70.0;

/// Default median below which a concept is weak for the cohort.
pub const DEFAULT_MASTERY_THRESHOLD: f64 = 70.0;

/// Score of `student` on `concept`; missing entries count as 0.
pub fn score_of(scores: &ScoreTable, student: &str, concept: &str) -> f64 {
    scores
        .get(student)
        .and_then(|row| row.get(concept))
        .copied()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_scores_count_as_zero() {
        let mut scores = ScoreTable::new();
        scores
            .entry("A".to_string())
            .or_default()
            .insert("X".to_string(), 88.0);

        assert_eq!(score_of(&scores, "A", "X"), 88.0);
        assert_eq!(score_of(&scores, "A", "Y"), 0.0);
        assert_eq!(score_of(&scores, "B", "X"), 0.0);
    }
}
