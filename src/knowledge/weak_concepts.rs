//! Cohort-wide and per-student weak concept detection.

use ordered_float::OrderedFloat;

use super::{score_of, ScoreTable, DEFAULT_MASTERY_THRESHOLD};

/// Median as the element at index `n / 2` of the ascending sort.
///
/// For an even count this is the upper of the two middle values, not their
/// mean. Returns `None` for an empty input.
pub fn median_score(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort();
    Some(sorted[sorted.len() / 2].into_inner())
}

/// Flags concepts whose cohort median is below the mastery threshold.
#[derive(Debug, Clone, Copy)]
pub struct WeakConceptSelector {
    threshold: f64,
}

impl Default for WeakConceptSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MASTERY_THRESHOLD)
    }
}

impl WeakConceptSelector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Median score of `concept` across `students`.
    pub fn concept_median(
        &self,
        scores: &ScoreTable,
        students: &[String],
        concept: &str,
    ) -> Option<f64> {
        let values: Vec<f64> = students
            .iter()
            .map(|s| score_of(scores, s, concept))
            .collect();
        median_score(&values)
    }

    /// Weak concepts, in the order of `concepts`.
    pub fn select(&self, scores: &ScoreTable, students: &[String], concepts: &[String]) -> Vec<String> {
        concepts
            .iter()
            .filter(|c| {
                self.concept_median(scores, students, c)
                    .is_some_and(|median| median < self.threshold)
            })
            .cloned()
            .collect()
    }
}

/// Concepts on which `student` scores below `threshold`, in concept order.
///
/// This is a per-student filter and is independent of the cohort median.
pub fn student_weak_concepts(
    scores: &ScoreTable,
    student: &str,
    concepts: &[String],
    threshold: f64,
) -> Vec<String> {
    concepts
        .iter()
        .filter(|c| score_of(scores, student, c) < threshold)
        .cloned()
        .collect()
}
