//! Property-based tests for the weighted round-robin scheduler's
//! guarantees, run over randomly generated flat forests of streams
//! directly beneath the root.

use std::collections::{HashMap, HashSet};

use priority_tree::PriorityTree;
use quickcheck::TestResult;

/// Builds a tree with one stream per weight, all direct children of the
/// root, ids assigned `1..=weights.len()`.
fn build_flat_tree(weights: &[u16]) -> (PriorityTree, Vec<u32>) {
    let mut tree = PriorityTree::new();
    let mut ids = Vec::with_capacity(weights.len());
    for (index, &weight) in weights.iter().enumerate() {
        let id = index as u32 + 1;
        tree.insert_stream(id, None, weight, false).unwrap();
        ids.push(id);
    }
    (tree, ids)
}

quickcheck::quickcheck! {
    /// The first `|S|` results of `next()` are a permutation of
    /// every stream in `S`: nobody repeats before everybody has had a turn.
    fn initial_burst_is_a_permutation(weights_raw: Vec<u8>) -> TestResult {
        if weights_raw.is_empty() || weights_raw.len() > 12 {
            return TestResult::discard();
        }
        let weights: Vec<u16> = weights_raw.iter().map(|&w| u16::from(w) + 1).collect();
        let (mut tree, ids) = build_flat_tree(&weights);

        let mut seen = HashSet::new();
        for _ in 0..ids.len() {
            seen.insert(tree.next().unwrap());
        }
        TestResult::from_bool(seen.len() == ids.len())
    }

    /// Over a full period (`sum(weights)`, after the
    /// warm-up burst), every stream is scheduled exactly its own weight's
    /// number of times.
    fn weight_proportional_distribution_over_one_period(weights_raw: Vec<u8>) -> TestResult {
        if weights_raw.is_empty() || weights_raw.len() > 6 {
            return TestResult::discard();
        }
        // Keep weights small (1..=8) so the period stays cheap to run.
        let weights: Vec<u16> = weights_raw.iter().map(|&w| (u16::from(w) % 8) + 1).collect();
        let (mut tree, ids) = build_flat_tree(&weights);
        let period: u32 = weights.iter().map(|&w| u32::from(w)).sum();

        // Warm-up burst before measuring a clean period.
        for _ in 0..ids.len() {
            tree.next().unwrap();
        }

        let mut counts: HashMap<u32, u32> = HashMap::new();
        for _ in 0..period {
            *counts.entry(tree.next().unwrap()).or_insert(0) += 1;
        }

        for (id, weight) in ids.iter().zip(weights.iter()) {
            if counts.get(id).copied().unwrap_or(0) != u32::from(*weight) {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }

    /// Ordering streams agrees with ordering their raw ids,
    /// independent of weight or activity: exercised here via insertion
    /// order not affecting which id wins a tie at the same level.
    fn equal_weight_streams_alternate_by_id_order(count: u8) -> TestResult {
        let count = (count % 8) as usize + 1;
        let weights = vec![16u16; count];
        let (mut tree, mut ids) = build_flat_tree(&weights);
        ids.sort_unstable();

        // With uniform weight, the very first round must visit every id
        // exactly once, and ties within that round resolve id-ascending,
        // so the first round's order must equal `ids` sorted.
        let mut first_round = Vec::with_capacity(ids.len());
        for _ in 0..ids.len() {
            first_round.push(tree.next().unwrap());
        }
        TestResult::from_bool(first_round == ids)
    }
}

/// If every non-root node is inactive, `next()` deadlocks, no
/// matter the shape of the tree.
#[test]
fn all_blocked_tree_of_any_shape_deadlocks() {
    let mut tree = PriorityTree::new();
    tree.insert_stream(1, None, 16, false).unwrap();
    tree.insert_stream(2, Some(1), 200, false).unwrap();
    tree.insert_stream(3, Some(1), 1, true).unwrap();
    tree.insert_stream(4, Some(3), 50, false).unwrap();

    for id in [1, 2, 3, 4] {
        tree.block(id).unwrap();
    }

    assert!(tree.next().is_err());
}
