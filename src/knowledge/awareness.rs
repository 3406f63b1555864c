//! Bipartite student/concept awareness relation.

use super::{score_of, ScoreTable};

/// Read-only view answering "is this student aware of this concept?".
///
/// An edge (student, concept) exists iff the score is at least `threshold`.
/// The graph borrows the score table and is never mutated; build a new one
/// when scores change.
#[derive(Debug, Clone, Copy)]
pub struct AwarenessGraph<'a> {
    scores: &'a ScoreTable,
    students: &'a [String],
    concepts: &'a [String],
    threshold: f64,
}

impl<'a> AwarenessGraph<'a> {
    pub fn new(
        scores: &'a ScoreTable,
        students: &'a [String],
        concepts: &'a [String],
        threshold: f64,
    ) -> Self {
        Self {
            scores,
            students,
            concepts,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_aware(&self, student: &str, concept: &str) -> bool {
        score_of(self.scores, student, concept) >= self.threshold
    }

    /// Concepts `student` is aware of, in concept order.
    pub fn concepts_aware_of(&self, student: &str) -> Vec<&'a str> {
        self.concepts
            .iter()
            .filter(|c| self.is_aware(student, c))
            .map(String::as_str)
            .collect()
    }

    /// Students aware of `concept`, in student order.
    pub fn students_aware_of(&self, concept: &str) -> Vec<&'a str> {
        self.students
            .iter()
            .filter(|s| self.is_aware(s, concept))
            .map(String::as_str)
            .collect()
    }

    /// All edges, students outer and concepts inner.
    pub fn edges(&self) -> Vec<(&'a str, &'a str)> {
        self.students
            .iter()
            .flat_map(|s| {
                self.concepts_aware_of(s)
                    .into_iter()
                    .map(move |c| (s.as_str(), c))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (ScoreTable, Vec<String>, Vec<String>) {
        let mut scores = ScoreTable::new();
        for (student, concept, score) in [
            ("A", "X", 90.0),
            ("A", "Y", 30.0),
            ("B", "X", 20.0),
            ("B", "Y", 95.0),
            ("C", "X", 70.0),
        ] {
            scores
                .entry(student.to_string())
                .or_default()
                .insert(concept.to_string(), score);
        }
        let students = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let concepts = vec!["X".to_string(), "Y".to_string()];
        (scores, students, concepts)
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (scores, students, concepts) = fixture();
        let graph = AwarenessGraph::new(&scores, &students, &concepts, 70.0);
        assert!(graph.is_aware("C", "X"));
        assert!(!graph.is_aware("C", "Y"));
        assert!(!graph.is_aware("nobody", "X"));
    }

    #[test]
    fn test_lookups() {
        let (scores, students, concepts) = fixture();
        let graph = AwarenessGraph::new(&scores, &students, &concepts, 70.0);
        assert_eq!(graph.concepts_aware_of("A"), vec!["X"]);
        assert_eq!(graph.students_aware_of("X"), vec!["A", "C"]);
        assert_eq!(graph.students_aware_of("Y"), vec!["B"]);
        assert_eq!(graph.edges(), vec![("A", "X"), ("B", "Y"), ("C", "X")]);
    }

    #[test]
    fn test_threshold_override() {
        let (scores, students, concepts) = fixture();
        let strict = AwarenessGraph::new(&scores, &students, &concepts, 91.0);
        assert_eq!(strict.edges(), vec![("B", "Y")]);
        assert_eq!(strict.threshold(), 91.0);
    }
}
