//! The `PriorityTree`: owns every stream node and exposes the public
//! dependency/scheduling operations described by the HTTP/2 priority model.

use std::collections::HashMap;

use log::{debug, trace};

use crate::error::{EmptyError, PriorityTreeError, Result, ROOT_STREAM_ID};
use crate::node::StreamNode;

/// Upper bound of the HTTP/2 weight range (inclusive); the wire encodes
/// `weight - 1` in a single byte, but this crate always works in `1..=256`.
pub const MAX_WEIGHT: u16 = 256;

/// A mutable forest of HTTP/2-style stream dependencies, plus the weighted
/// round-robin scheduler that walks it.
///
/// `PriorityTree` is a plain, synchronous value type: every public method
/// runs to completion with no suspension, I/O, or background work, and
/// nothing here is thread-safe on its own: wrap the whole tree in external
/// mutual exclusion if it must be shared across threads.
#[derive(Debug)]
pub struct PriorityTree {
    nodes: HashMap<u32, StreamNode>,
}

impl Default for PriorityTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityTree {
    /// Creates an empty tree containing only the synthetic root (id 0).
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_STREAM_ID, StreamNode::root());
        PriorityTree { nodes }
    }

    /// Returns whether `stream_id` is currently tracked by the tree (the
    /// root itself always counts).
    pub fn contains(&self, stream_id: u32) -> bool {
        self.nodes.contains_key(&stream_id)
    }

    /// Inserts a new stream into the tree.
    ///
    /// `depends_on` defaults to the root (`0`) when `None`. `weight` must
    /// fall in `1..=256`; `exclusive` requests that the new stream become
    /// the sole child of `depends_on`, displacing its previous children
    /// into grandchildren of the new stream. The new stream starts active.
    ///
    /// Exclusive insertion beneath the root is permitted (see the open
    /// question this resolves in `DESIGN.md`).
    ///
    /// # Errors
    ///
    /// - `PriorityTreeError::InvalidArgument` if `stream_id == 0` or
    ///   `weight` is outside `1..=256`.
    /// - `PriorityTreeError::DuplicateStream` if `stream_id` is already
    ///   present.
    /// - `PriorityTreeError::UnknownParent` if `depends_on` is not present.
    pub fn insert_stream(
        &mut self,
        stream_id: u32,
        depends_on: Option<u32>,
        weight: u16,
        exclusive: bool,
    ) -> Result<()> {
        if stream_id == ROOT_STREAM_ID {
            debug!("rejecting insert_stream: stream id 0 is reserved for the root");
            return Err(PriorityTreeError::InvalidArgument(
                "stream id 0 is reserved for the root".into(),
            ));
        }
        if weight < 1 || weight > MAX_WEIGHT {
            debug!("rejecting insert_stream({}): weight {} out of range", stream_id, weight);
            return Err(PriorityTreeError::InvalidArgument(format!(
                "weight {} is outside 1..=256",
                weight
            )));
        }
        if self.nodes.contains_key(&stream_id) {
            debug!("rejecting insert_stream({}): already present", stream_id);
            return Err(PriorityTreeError::DuplicateStream(stream_id));
        }
        let parent_id = depends_on.unwrap_or(ROOT_STREAM_ID);
        if !self.nodes.contains_key(&parent_id) {
            debug!(
                "rejecting insert_stream({}): depends_on {} is unknown",
                stream_id, parent_id
            );
            return Err(PriorityTreeError::UnknownParent(parent_id));
        }

        self.nodes.insert(stream_id, StreamNode::new(stream_id, weight));
        if exclusive {
            self.link_exclusive(parent_id, stream_id);
        } else {
            self.link(parent_id, stream_id);
        }
        debug!(
            "insert_stream({}) depends_on={} weight={} exclusive={}",
            stream_id, parent_id, weight, exclusive
        );
        Ok(())
    }

    /// Removes a stream from the tree. Its children are re-parented to its
    /// own parent, joining at the parent's current scheduling wavefront;
    /// they are never orphaned or destroyed.
    ///
    /// # Errors
    ///
    /// `PriorityTreeError::UnknownStream` if `stream_id` is absent or `0`.
    pub fn remove_stream(&mut self, stream_id: u32) -> Result<()> {
        if stream_id == ROOT_STREAM_ID || !self.nodes.contains_key(&stream_id) {
            debug!("rejecting remove_stream({}): unknown stream", stream_id);
            return Err(PriorityTreeError::UnknownStream(stream_id));
        }
        let parent_id = self.nodes[&stream_id].parent.expect("non-root always has a parent");
        self.unlink(parent_id, stream_id);
        self.nodes.remove(&stream_id);
        debug!("remove_stream({})", stream_id);
        Ok(())
    }

    /// Marks `stream_id` as having no data ready to send.
    ///
    /// # Errors
    ///
    /// `PriorityTreeError::UnknownStream` if `stream_id` is absent or `0`.
    pub fn block(&mut self, stream_id: u32) -> Result<()> {
        self.set_active(stream_id, false)
    }

    /// Marks `stream_id` as having data ready to send.
    ///
    /// # Errors
    ///
    /// `PriorityTreeError::UnknownStream` if `stream_id` is absent or `0`.
    pub fn unblock(&mut self, stream_id: u32) -> Result<()> {
        self.set_active(stream_id, true)
    }

    fn set_active(&mut self, stream_id: u32, active: bool) -> Result<()> {
        if stream_id == ROOT_STREAM_ID {
            debug!("rejecting {}({}): the root cannot be (un)blocked", if active { "unblock" } else { "block" }, stream_id);
            return Err(PriorityTreeError::UnknownStream(stream_id));
        }
        match self.nodes.get_mut(&stream_id) {
            Some(node) => {
                node.active = active;
                debug!("{}({})", if active { "unblock" } else { "block" }, stream_id);
                Ok(())
            }
            None => {
                debug!("rejecting (un)block({}): unknown stream", stream_id);
                Err(PriorityTreeError::UnknownStream(stream_id))
            }
        }
    }

    /// Re-prioritizes an existing stream: equivalent to `remove_stream`
    /// followed by `insert_stream` with the new dependency parameters,
    /// preserving the stream's `active` flag across the move.
    ///
    /// The HTTP/2 rule that re-parenting a stream beneath one of its own
    /// descendants must first promote that descendant is a caller
    /// responsibility; this method does not special-case it.
    ///
    /// # Errors
    ///
    /// Propagates any error `remove_stream`/`insert_stream` would raise.
    pub fn reprioritize(
        &mut self,
        stream_id: u32,
        depends_on: Option<u32>,
        weight: u16,
        exclusive: bool,
    ) -> Result<()> {
        let was_active = self
            .nodes
            .get(&stream_id)
            .map(|node| node.active)
            .ok_or(PriorityTreeError::UnknownStream(stream_id))?;
        self.remove_stream(stream_id)?;
        self.insert_stream(stream_id, depends_on, weight, exclusive)?;
        if !was_active {
            self.block(stream_id)?;
        }
        Ok(())
    }

    /// Returns the id of the next stream that should transmit, or
    /// `PriorityTreeError::Deadlock` if nothing reachable from the root is
    /// active.
    pub fn next(&mut self) -> Result<u32> {
        match self.schedule_from(ROOT_STREAM_ID) {
            Ok(id) => {
                trace!("next() -> {}", id);
                Ok(id)
            }
            Err(EmptyError) => {
                debug!("next(): deadlock, no active stream reachable from the root");
                Err(PriorityTreeError::Deadlock)
            }
        }
    }

    /// Returns an iterator-style cursor over successive `next()` calls: it
    /// yields `Some(stream_id)` for as long as the tree can make progress
    /// and stops (`None`) the first time `next()` would deadlock.
    pub fn cursor(&mut self) -> Cursor<'_> {
        Cursor { tree: self }
    }

    // -- structural operations, lifted from `StreamNode` methods to
    // free functions over the node map because recursion through owning
    // child references isn't expressible without the cycles the tree's
    // id-indexed map encoding was chosen to avoid. --

    /// Links `child_id` under `parent_id` as an ordinary (non-exclusive)
    /// dependency.
    fn link(&mut self, parent_id: u32, child_id: u32) {
        self.nodes.get_mut(&child_id).expect("child exists").parent = Some(parent_id);
        self.nodes
            .get_mut(&parent_id)
            .expect("parent exists")
            .adopt(child_id);
    }

    /// Links `child_id` under `parent_id` exclusively: `child_id` becomes
    /// the sole child of `parent_id`, and every prior child of `parent_id`
    /// becomes a child of `child_id` instead.
    fn link_exclusive(&mut self, parent_id: u32, child_id: u32) {
        let old_children: Vec<u32> = self.nodes[&parent_id].children.iter().cloned().collect();
        self.nodes
            .get_mut(&parent_id)
            .expect("parent exists")
            .clear_children();
        self.link(parent_id, child_id);
        for orphan in old_children {
            self.link(child_id, orphan);
        }
    }

    /// Unlinks `child_id` from `parent_id`, re-parenting `child_id`'s own
    /// children onto `parent_id` so they are never orphaned.
    fn unlink(&mut self, parent_id: u32, child_id: u32) {
        self.nodes
            .get_mut(&parent_id)
            .expect("parent exists")
            .forget(child_id);
        let grandchildren: Vec<u32> = self.nodes[&child_id].children.iter().cloned().collect();
        for grandchild in grandchildren {
            self.link(parent_id, grandchild);
        }
    }

    // -- scheduling --

    /// Weighted round-robin descent from `node_id`, returning the id of an
    /// active descendant or `EmptyError` if none exists. Must only be
    /// called on a node whose own `active` flag is false.
    fn schedule_from(&mut self, node_id: u32) -> ::std::result::Result<u32, EmptyError> {
        let mut popped: Vec<(i64, u32)> = Vec::new();

        let outcome = loop {
            let popped_entry = match self.nodes.get_mut(&node_id).expect("node exists").pop_next() {
                Some(entry) => entry,
                None => break Err(EmptyError),
            };
            popped.push(popped_entry);
            let (_, child_id) = popped_entry;

            if self.nodes[&child_id].active {
                break Ok(child_id);
            }
            match self.schedule_from(child_id) {
                Ok(id) => break Ok(id),
                Err(EmptyError) => continue,
            }
        };

        // Every popped entry is re-queued and advanced, whether or not it
        // turned out to be the winner: otherwise an inactive subtree would
        // be re-probed on every single call instead of taking its turn.
        for (level, child_id) in popped {
            let weight = self.nodes[&child_id].weight;
            self.nodes
                .get_mut(&node_id)
                .expect("node exists")
                .requeue(level, child_id, weight);
        }

        outcome
    }
}

/// An iterator-style view over repeated `next()` calls on a `PriorityTree`.
/// See `PriorityTree::cursor`.
pub struct Cursor<'a> {
    tree: &'a mut PriorityTree,
}

impl<'a> Iterator for Cursor<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.tree.next().ok()
    }
}
