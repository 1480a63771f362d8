//! The per-stream scheduling node: its place in the dependency tree and its
//! weighted round-robin bookkeeping over its own children.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

/// Default weight assigned to a stream when `insert_stream` isn't given one.
pub const DEFAULT_WEIGHT: u16 = 16;

/// The nominal "full turn" every child's level advances by per round,
/// divided by its weight. 256 matches HTTP/2's 1..=256 weight range so that
/// a weight-256 child advances by exactly 1 per pop.
const LEVEL_QUANTUM: i64 = 256;

/// One entry in a node's `child_queue`: a `(level, child id)` pair. Ordered
/// so the *lowest* level sorts first, with ties broken by id ascending.
/// Id-ordering is the only reason `Stream` needs a total order at all.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct QueueEntry {
    level: i64,
    id: u32,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; reverse both keys so `.pop()` returns
        // the lowest level (and, on a tie, the lowest id) first.
        other
            .level
            .cmp(&self.level)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single stream's priority bookkeeping: its weight, whether it currently
/// has data ready, and the weighted round-robin state it keeps for its own
/// children.
///
/// `parent` and `children` hold stream ids rather than owning references:
/// the tree (`PriorityTree`) is the sole owner of every `StreamNode`, kept
/// in a flat id-keyed map, which sidesteps the cyclic parent/child
/// references a naive owning-pointer encoding would create.
#[derive(Debug)]
pub(crate) struct StreamNode {
    pub(crate) id: u32,
    pub(crate) weight: u16,
    pub(crate) active: bool,
    pub(crate) parent: Option<u32>,
    pub(crate) children: HashSet<u32>,
    child_queue: BinaryHeap<QueueEntry>,
    last_level: i64,
    deficit: HashMap<u32, u16>,
}

impl StreamNode {
    /// Builds the synthetic root: id 0, weight 1, permanently inactive, no
    /// parent.
    pub(crate) fn root() -> Self {
        StreamNode {
            id: 0,
            weight: 1,
            active: false,
            parent: None,
            children: HashSet::new(),
            child_queue: BinaryHeap::new(),
            last_level: 0,
            deficit: HashMap::new(),
        }
    }

    /// Builds a freshly inserted stream. New streams start active: the
    /// framing layer is expected to `block` one as soon as it learns it has
    /// no data ready, rather than the tree defaulting to inactive.
    pub(crate) fn new(id: u32, weight: u16) -> Self {
        StreamNode {
            id,
            weight,
            active: true,
            parent: None,
            children: HashSet::new(),
            child_queue: BinaryHeap::new(),
            last_level: 0,
            deficit: HashMap::new(),
        }
    }

    /// Registers `child_id` as a child of this node, joining the round at
    /// this node's current `last_level` rather than at 0: a late-joining
    /// child shouldn't "catch up" for periods during which it was absent.
    pub(crate) fn adopt(&mut self, child_id: u32) {
        self.children.insert(child_id);
        self.deficit.entry(child_id).or_insert(0);
        self.child_queue.push(QueueEntry {
            level: self.last_level,
            id: child_id,
        });
    }

    /// Clears all children bookkeeping, as the first step of an exclusive
    /// insertion (`add_child_exclusive`).
    pub(crate) fn clear_children(&mut self) {
        self.children.clear();
        self.child_queue = BinaryHeap::new();
        self.last_level = 0;
        self.deficit.clear();
    }

    /// Drops `child_id` from the scheduling queue, preserving every other
    /// entry's level. Linear in fan-out, same as the source's rebuild.
    pub(crate) fn forget(&mut self, child_id: u32) {
        self.children.remove(&child_id);
        self.deficit.remove(&child_id);
        let kept: Vec<QueueEntry> = self
            .child_queue
            .drain()
            .filter(|entry| entry.id != child_id)
            .collect();
        self.child_queue = kept.into_iter().collect();
    }

    /// Pops the lowest-level child, if any.
    pub(crate) fn pop_next(&mut self) -> Option<(i64, u32)> {
        self.child_queue.pop().map(|entry| (entry.level, entry.id))
    }

    /// Re-inserts a popped `(level, child_id)` pair, advancing its level by
    /// the deficit-carrying weighted round-robin step. `this.last_level`
    /// is set to the level the entry was popped at, same as the source.
    pub(crate) fn requeue(&mut self, level: i64, child_id: u32, child_weight: u16) {
        self.last_level = level;
        let carried = i64::from(*self.deficit.get(&child_id).unwrap_or(&0));
        let step = (LEVEL_QUANTUM + carried) / i64::from(child_weight);
        let remainder = (LEVEL_QUANTUM + carried) % i64::from(child_weight);
        self.deficit.insert(child_id, remainder as u16);
        self.child_queue.push(QueueEntry {
            level: level + step,
            id: child_id,
        });
    }
}

impl fmt::Display for StreamNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamNode<id={}, weight={}, active={}>",
            self.id, self.weight, self.active
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_child_joins_at_current_level_not_zero() {
        let mut root = StreamNode::root();
        root.adopt(1);
        // Simulate 1 having already been scheduled twice, advancing the
        // round's wavefront.
        let (level, id) = root.pop_next().unwrap();
        root.requeue(level, id, DEFAULT_WEIGHT);
        let (level, id) = root.pop_next().unwrap();
        root.requeue(level, id, DEFAULT_WEIGHT);
        let wavefront = root.last_level;
        assert!(wavefront > 0);

        // A late joiner should enter at the parent's current last_level,
        // not back at 0, so it joins the front of the queue instead of
        // flooding it with free turns it didn't earn.
        root.adopt(2);
        let (level, id) = root.pop_next().unwrap();
        assert_eq!(id, 2);
        assert_eq!(level, wavefront);
    }

    #[test]
    fn forget_drops_only_the_named_child() {
        let mut root = StreamNode::root();
        root.adopt(1);
        root.adopt(2);
        root.forget(1);
        assert!(!root.children.contains(&1));
        assert!(root.children.contains(&2));
        let (_, id) = root.pop_next().unwrap();
        assert_eq!(id, 2);
        assert!(root.pop_next().is_none());
    }

    #[test]
    fn requeue_carries_deficit_for_weights_256_does_not_divide() {
        // Weight 5: 256 / 5 = 51 remainder 1, so the deficit carried across
        // five rounds should land the entry back at exactly level 256, one
        // full period, rather than drifting from truncation.
        let mut root = StreamNode::root();
        root.adopt(1);
        for _ in 0..5 {
            let (level, id) = root.pop_next().unwrap();
            root.requeue(level, id, 5);
        }
        let (level, _id) = root.pop_next().unwrap();
        assert_eq!(level, 256);
    }
}
