//! Greedy maximum-coverage study groups.
//!
//! Students are partitioned into groups of at most `target_size`. Each group
//! starts from the unassigned student aware of the most concepts, then adds
//! the student covering the most concepts the group does not cover yet. Once
//! every concept is covered, the group is still filled up to `target_size`
//! using the same objective, so groups stay balanced.
//!
//! Ties go to the first maximizer in the order students were given, which
//! makes the output deterministic. Each pick scans all remaining students
//! over all concepts: O(students^2 * concepts) overall, fine for a classroom
//! but not for large cohorts.

use std::collections::BTreeMap;

use tracing::debug;

use super::{score_of, ScoreTable, DEFAULT_AWARENESS_THRESHOLD};

/// Study groups by id (1, 2, ...). Members are sorted by name.
pub type StudyGroups = BTreeMap<u32, Vec<String>>;

/// How one group was formed.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFormation {
    pub id: u32,
    /// Members in the order they were picked; the seed comes first.
    pub picks: Vec<String>,
    /// Newly covered concept count contributed by each pick.
    pub gains: Vec<usize>,
    /// Concepts covered by the group, in concept order.
    pub covered: Vec<String>,
}

/// Builds study groups that maximize concept coverage per group.
#[derive(Debug, Clone, Copy)]
pub struct StudyGroupBuilder {
    target_size: usize,
    awareness_threshold: f64,
}

impl Default for StudyGroupBuilder {
    fn default() -> Self {
        Self::new(2)
    }
}

impl StudyGroupBuilder {
    /// Creates a builder. A `target_size` of 0 is treated as 1.
    pub fn new(target_size: usize) -> Self {
        Self {
            target_size: target_size.max(1),
            awareness_threshold: DEFAULT_AWARENESS_THRESHOLD,
        }
    }

    pub fn with_awareness_threshold(mut self, threshold: f64) -> Self {
        self.awareness_threshold = threshold;
        self
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Partitions `students` into study groups.
    pub fn build(
        &self,
        scores: &ScoreTable,
        students: &[String],
        concepts: &[String],
    ) -> StudyGroups {
        self.form_groups(scores, students, concepts)
            .into_iter()
            .map(|formation| {
                let mut members = formation.picks;
                members.sort();
                (formation.id, members)
            })
            .collect()
    }

    /// Runs the greedy partition and reports how each group was formed.
    pub fn form_groups(
        &self,
        scores: &ScoreTable,
        students: &[String],
        concepts: &[String],
    ) -> Vec<GroupFormation> {
        // aware[c][s]: student s is aware of concept c.
        let aware: Vec<Vec<bool>> = concepts
            .iter()
            .map(|c| {
                students
                    .iter()
                    .map(|s| score_of(scores, s, c) >= self.awareness_threshold)
                    .collect()
            })
            .collect();

        let aware_count = |s: usize| aware.iter().filter(|row| row[s]).count();
        let gain = |s: usize, covered: &[bool]| {
            aware
                .iter()
                .zip(covered)
                .filter(|(row, is_covered)| row[s] && !**is_covered)
                .count()
        };

        let mut unassigned: Vec<usize> = (0..students.len()).collect();
        let mut formations = Vec::new();
        let mut next_id = 1u32;

        while !unassigned.is_empty() {
            let mut covered = vec![false; concepts.len()];
            let mut picks = Vec::new();
            let mut gains = Vec::new();

            // Seed: most concepts known.
            if let Some(seed) = first_max_by_key(&unassigned, &aware_count) {
                gains.push(absorb(seed, &aware, &mut covered, &mut unassigned));
                picks.push(seed);
            }

            // Coverage extension.
            while covered.contains(&false)
                && picks.len() < self.target_size
                && !unassigned.is_empty()
            {
                let Some(next) = first_max_by_key(&unassigned, |s| gain(s, &covered)) else {
                    break;
                };
                gains.push(absorb(next, &aware, &mut covered, &mut unassigned));
                picks.push(next);
            }

            // Fill to capacity, even with zero gain.
            while picks.len() < self.target_size && !unassigned.is_empty() {
                let Some(next) = first_max_by_key(&unassigned, |s| gain(s, &covered)) else {
                    break;
                };
                gains.push(absorb(next, &aware, &mut covered, &mut unassigned));
                picks.push(next);
            }

            let formation = GroupFormation {
                id: next_id,
                picks: picks.iter().map(|&s| students[s].clone()).collect(),
                gains,
                covered: concepts
                    .iter()
                    .zip(&covered)
                    .filter(|(_, is_covered)| **is_covered)
                    .map(|(c, _)| c.clone())
                    .collect(),
            };
            debug!(
                group = formation.id,
                members = ?formation.picks,
                covered = formation.covered.len(),
                "Study group formed"
            );
            formations.push(formation);
            next_id += 1;
        }

        formations
    }
}

/// Adds student `s` to the group's coverage and removes it from `unassigned`.
/// Returns the number of newly covered concepts.
fn absorb(s: usize, aware: &[Vec<bool>], covered: &mut [bool], unassigned: &mut Vec<usize>) -> usize {
    let mut newly = 0;
    for (row, is_covered) in aware.iter().zip(covered.iter_mut()) {
        if row[s] && !*is_covered {
            *is_covered = true;
            newly += 1;
        }
    }
    unassigned.retain(|&u| u != s);
    newly
}

/// First item of `items` with the greatest key.
fn first_max_by_key(items: &[usize], mut key: impl FnMut(usize) -> usize) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for &item in items {
        let k = key(item);
        if best.map_or(true, |(_, best_key)| k > best_key) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn table(rows: &[(&str, &str, f64)]) -> ScoreTable {
        let mut scores = ScoreTable::new();
        for (s, c, v) in rows {
            scores
                .entry(s.to_string())
                .or_default()
                .insert(c.to_string(), *v);
        }
        scores
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn abc_fixture() -> (ScoreTable, Vec<String>, Vec<String>) {
        let scores = table(&[
            ("A", "X", 90.0),
            ("A", "Y", 30.0),
            ("B", "X", 20.0),
            ("B", "Y", 95.0),
            ("C", "X", 40.0),
            ("C", "Y", 40.0),
        ]);
        (scores, names(&["A", "B", "C"]), names(&["X", "Y"]))
    }

    /// Deterministic LCG for generated cohorts.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    fn random_cohort(seed: u64, n_students: usize, n_concepts: usize) -> (ScoreTable, Vec<String>, Vec<String>) {
        let mut rng = Lcg(seed);
        let students: Vec<String> = (0..n_students).map(|i| format!("s{:02}", i)).collect();
        let concepts: Vec<String> = (0..n_concepts).map(|i| format!("c{:02}", i)).collect();
        let mut scores = ScoreTable::new();
        for s in &students {
            for c in &concepts {
                // Leave some cells missing.
                if rng.next() % 7 == 0 {
                    continue;
                }
                let value = (rng.next() % 101) as f64;
                scores.entry(s.clone()).or_default().insert(c.clone(), value);
            }
        }
        (scores, students, concepts)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (scores, students, concepts) = abc_fixture();
        let groups = StudyGroupBuilder::new(2).build(&scores, &students, &concepts);

        let mut expected = StudyGroups::new();
        expected.insert(1, names(&["A", "B"]));
        expected.insert(2, names(&["C"]));
        assert_eq!(groups, expected);
    }

    #[test]
    fn test_seed_tie_goes_to_first_student() {
        let (scores, students, concepts) = abc_fixture();
        let formations = StudyGroupBuilder::new(2).form_groups(&scores, &students, &concepts);
        assert_eq!(formations[0].picks, names(&["A", "B"]));
        assert_eq!(formations[0].gains, vec![1, 1]);
        assert_eq!(formations[0].covered, names(&["X", "Y"]));

        let reversed = names(&["B", "A", "C"]);
        let formations = StudyGroupBuilder::new(2).form_groups(&scores, &reversed, &concepts);
        assert_eq!(formations[0].picks, names(&["B", "A"]));
    }

    #[test]
    fn test_fill_phase_pads_full_coverage_groups() {
        // A alone covers everything; the group is still filled to size 3.
        let scores = table(&[
            ("A", "X", 95.0),
            ("A", "Y", 95.0),
            ("B", "X", 10.0),
            ("C", "Y", 10.0),
            ("D", "X", 80.0),
        ]);
        let students = names(&["A", "B", "C", "D"]);
        let concepts = names(&["X", "Y"]);

        let formations = StudyGroupBuilder::new(3).form_groups(&scores, &students, &concepts);
        assert_eq!(formations.len(), 2);
        assert_eq!(formations[0].picks, names(&["A", "B", "C"]));
        assert_eq!(formations[0].gains, vec![2, 0, 0]);
        assert_eq!(formations[1].picks, names(&["D"]));
    }

    #[test]
    fn test_extension_prefers_complementary_student() {
        let scores = table(&[
            ("A", "X", 90.0),
            ("A", "Y", 90.0),
            ("B", "X", 90.0),
            ("B", "Y", 90.0),
            ("C", "Z", 90.0),
        ]);
        let students = names(&["A", "B", "C"]);
        let concepts = names(&["X", "Y", "Z"]);

        let groups = StudyGroupBuilder::new(2).build(&scores, &students, &concepts);
        assert_eq!(groups.get(&1), Some(&names(&["A", "C"])));
        assert_eq!(groups.get(&2), Some(&names(&["B"])));
    }

    #[test]
    fn test_target_size_one_and_zero() {
        let (scores, students, concepts) = abc_fixture();
        let groups = StudyGroupBuilder::new(1).build(&scores, &students, &concepts);
        assert_eq!(groups.len(), 3);
        assert!(groups.values().all(|g| g.len() == 1));

        assert_eq!(StudyGroupBuilder::new(0).target_size(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        let scores = ScoreTable::new();
        assert!(StudyGroupBuilder::default()
            .build(&scores, &[], &names(&["X"]))
            .is_empty());

        // No concepts: everyone is grouped purely by size.
        let groups = StudyGroupBuilder::new(2).build(&scores, &names(&["A", "B", "C"]), &[]);
        assert_eq!(groups.get(&1), Some(&names(&["A", "B"])));
        assert_eq!(groups.get(&2), Some(&names(&["C"])));
    }

    #[test]
    fn test_groups_partition_students() {
        for seed in 0..40u64 {
            let n_students = 1 + (seed as usize % 9);
            let n_concepts = seed as usize % 6;
            let target = 1 + (seed as usize % 4);
            let (scores, students, concepts) = random_cohort(seed, n_students, n_concepts);

            let groups = StudyGroupBuilder::new(target).build(&scores, &students, &concepts);

            let ids: Vec<u32> = groups.keys().copied().collect();
            let expected_ids: Vec<u32> = (1..=groups.len() as u32).collect();
            assert_eq!(ids, expected_ids, "seed {}", seed);

            let mut seen = BTreeSet::new();
            for members in groups.values() {
                assert!(!members.is_empty(), "seed {}", seed);
                assert!(members.len() <= target, "seed {}", seed);
                let mut sorted = members.clone();
                sorted.sort();
                assert_eq!(&sorted, members, "seed {}", seed);
                for m in members {
                    assert!(seen.insert(m.clone()), "duplicate {} (seed {})", m, seed);
                }
            }
            let all: BTreeSet<String> = students.iter().cloned().collect();
            assert_eq!(seen, all, "seed {}", seed);
        }
    }

    #[test]
    fn test_each_pick_has_maximal_gain() {
        let threshold = DEFAULT_AWARENESS_THRESHOLD;
        for seed in 100..130u64 {
            let (scores, students, concepts) = random_cohort(seed, 8, 5);
            let target = 2 + (seed as usize % 3);
            let formations = StudyGroupBuilder::new(target).form_groups(&scores, &students, &concepts);

            let aware = |s: &str, c: &str| score_of(&scores, s, c) >= threshold;
            let mut remaining: Vec<String> = students.clone();

            for formation in &formations {
                let mut covered: BTreeSet<&str> = BTreeSet::new();
                for (i, pick) in formation.picks.iter().enumerate() {
                    let gain_of = |s: &str| {
                        concepts
                            .iter()
                            .filter(|c| aware(s, c) && !covered.contains(c.as_str()))
                            .count()
                    };
                    let pick_gain = gain_of(pick);
                    assert_eq!(pick_gain, formation.gains[i], "seed {}", seed);
                    if i > 0 {
                        for other in &remaining {
                            assert!(pick_gain >= gain_of(other), "seed {}", seed);
                        }
                    }
                    remaining.retain(|s| s != pick);
                    for c in &concepts {
                        if aware(pick, c) {
                            covered.insert(c.as_str());
                        }
                    }
                }
            }
            assert!(remaining.is_empty());
        }
    }
}
