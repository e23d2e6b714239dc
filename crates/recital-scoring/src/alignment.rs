//! Word-level edit-distance alignment.

use recital_core::{AlignmentEntry, AlignmentOp, AlignmentResult};
use std::cmp::Ordering;

use crate::similarity::similarity;

/// DP cell: edit cost so far and the number of matches on that path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    cost: usize,
    matches: usize,
}

impl Cell {
    fn step(self, cost: usize, matched: bool) -> Cell {
        Cell {
            cost: self.cost + cost,
            matches: self.matches + usize::from(matched),
        }
    }

    /// Lower cost wins, then more matches.
    fn better(self, other: Cell) -> Cell {
        match self
            .cost
            .cmp(&other.cost)
            .then_with(|| other.matches.cmp(&self.matches))
        {
            Ordering::Greater => other,
            _ => self,
        }
    }
}

/// Move chosen for a DP cell, in backtracking preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Match,
    Substitution,
    Deletion,
    Insertion,
}

/// Whether two words align for free. Pairs whose lengths alone cap the
/// similarity below the threshold skip the full comparison.
fn words_match(a: &str, a_len: usize, b: &str, b_len: usize, min_similarity: f64) -> bool {
    if a == b {
        return true;
    }
    let total = a_len + b_len;
    if total == 0 || 2.0 * a_len.min(b_len) as f64 / (total as f64) < min_similarity {
        return false;
    }
    similarity(a, b) >= min_similarity
}

/// Align `reference` against `hypothesis`.
///
/// A word pair whose similarity reaches `min_similarity` aligns for free and
/// counts as a match; any other pairing is a substitution. Every word of both
/// sequences ends up in exactly one entry.
///
/// Costs are kept for two rows only; the full table holds one byte per cell
/// recording the chosen step.
pub fn align(reference: &[String], hypothesis: &[String], min_similarity: f64) -> AlignmentResult {
    let n = reference.len();
    let m = hypothesis.len();
    let width = m + 1;

    let ref_lens: Vec<usize> = reference.iter().map(|w| w.chars().count()).collect();
    let hyp_lens: Vec<usize> = hypothesis.iter().map(|w| w.chars().count()).collect();

    let mut steps = vec![Step::Insertion; (n + 1) * width];
    for i in 1..=n {
        steps[i * width] = Step::Deletion;
    }

    let mut prev: Vec<Cell> = (0..=m).map(|j| Cell { cost: j, matches: 0 }).collect();
    let mut row = prev.clone();

    for i in 1..=n {
        row[0] = Cell { cost: i, matches: 0 };
        for j in 1..=m {
            let matched = words_match(
                &reference[i - 1],
                ref_lens[i - 1],
                &hypothesis[j - 1],
                hyp_lens[j - 1],
                min_similarity,
            );
            let diagonal = prev[j - 1].step(usize::from(!matched), matched);
            let deletion = prev[j].step(1, false);
            let insertion = row[j - 1].step(1, false);
            let best = diagonal.better(deletion).better(insertion);

            row[j] = best;
            steps[i * width + j] = if diagonal == best {
                if matched {
                    Step::Match
                } else {
                    Step::Substitution
                }
            } else if deletion == best {
                Step::Deletion
            } else {
                Step::Insertion
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    let mut entries = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        match steps[i * width + j] {
            step @ (Step::Match | Step::Substitution) => {
                entries.push(AlignmentEntry {
                    op: if step == Step::Match {
                        AlignmentOp::Match
                    } else {
                        AlignmentOp::Substitution
                    },
                    reference_index: Some(i - 1),
                    hypothesis_index: Some(j - 1),
                    similarity: similarity(&reference[i - 1], &hypothesis[j - 1]),
                });
                i -= 1;
                j -= 1;
            }
            Step::Deletion => {
                entries.push(AlignmentEntry {
                    op: AlignmentOp::Deletion,
                    reference_index: Some(i - 1),
                    hypothesis_index: None,
                    similarity: 0.0,
                });
                i -= 1;
            }
            Step::Insertion => {
                entries.push(AlignmentEntry {
                    op: AlignmentOp::Insertion,
                    reference_index: None,
                    hypothesis_index: Some(j - 1),
                    similarity: 0.0,
                });
                j -= 1;
            }
        }
    }

    entries.reverse();
    AlignmentResult { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn assert_total(result: &AlignmentResult, n: usize, m: usize) {
        let matches = result.count(AlignmentOp::Match);
        let subs = result.count(AlignmentOp::Substitution);
        assert_eq!(matches + subs + result.count(AlignmentOp::Deletion), n);
        assert_eq!(matches + subs + result.count(AlignmentOp::Insertion), m);

        let mut refs: Vec<usize> = result.entries.iter().filter_map(|e| e.reference_index).collect();
        let mut hyps: Vec<usize> = result.entries.iter().filter_map(|e| e.hypothesis_index).collect();
        refs.dedup();
        hyps.dedup();
        assert_eq!(refs, (0..n).collect::<Vec<_>>());
        assert_eq!(hyps, (0..m).collect::<Vec<_>>());
    }

    #[test]
    fn test_identical_sequences_all_match() {
        let r = words("the quick brown fox");
        let result = align(&r, &r, 0.7);
        assert_eq!(result.matches().len(), 4);
        assert!(result.substitutions().is_empty());
        assert_total(&result, 4, 4);
    }

    #[test]
    fn test_single_deletion() {
        let r = words("the quick brown fox");
        let h = words("the quick fox");
        let result = align(&r, &h, 0.7);
        assert_eq!(result.deletions(), vec![(Some(2), None)]);
        assert_eq!(result.matches().len(), 3);
        assert_total(&result, 4, 3);
    }

    #[test]
    fn test_insertion_and_substitution() {
        let r = words("read the book");
        let h = words("please read a book");
        let result = align(&r, &h, 0.7);
        assert_eq!(result.count(AlignmentOp::Match), 2);
        assert_eq!(result.insertions(), vec![(None, Some(0))]);
        assert_eq!(result.substitutions(), vec![(Some(1), Some(2))]);
        assert_total(&result, 3, 4);
    }

    #[test]
    fn test_similar_words_match() {
        let result = align(&words("colour"), &words("color"), 0.7);
        assert_eq!(result.matches(), vec![(Some(0), Some(0))]);
        assert!(result.entries[0].similarity < 1.0);

        let strict = align(&words("colour"), &words("color"), 0.95);
        assert_eq!(strict.substitutions(), vec![(Some(0), Some(0))]);
    }

    #[test]
    fn test_empty_sides() {
        let r = words("one two");
        let empty: Vec<String> = Vec::new();

        let result = align(&r, &empty, 0.7);
        assert_eq!(result.deletions().len(), 2);
        assert_total(&result, 2, 0);

        let result = align(&empty, &r, 0.7);
        assert_eq!(result.insertions().len(), 2);
        assert_total(&result, 0, 2);

        assert!(align(&empty, &empty, 0.7).entries.is_empty());
    }

    #[test]
    fn test_length_bound_never_hides_a_match() {
        // 2*4/(4+6) = 0.8 clears the threshold, so the full comparison runs.
        let result = align(&words("read"), &words("reader"), 0.8);
        assert_eq!(result.matches(), vec![(Some(0), Some(0))]);

        // 2*2/(2+8) = 0.4 cannot reach 0.7.
        let result = align(&words("is"), &words("isolation"), 0.7);
        assert_eq!(result.substitutions(), vec![(Some(0), Some(0))]);
    }

    #[test]
    fn test_long_sequences_stay_total() {
        let r: Vec<String> = (0..600).map(|i| format!("w{}", i % 37)).collect();
        let h: Vec<String> = (0..550).map(|i| format!("w{}", (i * 7) % 41)).collect();
        let result = align(&r, &h, 0.7);
        assert_total(&result, 600, 550);
    }
}
