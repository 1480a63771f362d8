//! Error types returned by the priority tree's public operations.

use std::error;
use std::fmt;

/// The stream id reserved for the synthetic root of the tree. No operation
/// may create, remove, block, or unblock it.
pub const ROOT_STREAM_ID: u32 = 0;

/// A result type specialized for this crate's fallible operations.
pub type Result<T> = ::std::result::Result<T, PriorityTreeError>;

/// Everything that can go wrong while mutating or querying a `PriorityTree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityTreeError {
    /// `insert_stream` was called with a `stream_id` already present in the
    /// tree.
    DuplicateStream(u32),
    /// `remove_stream`, `block`, or `unblock` was called with a `stream_id`
    /// that is absent from the tree (or is the root).
    UnknownStream(u32),
    /// `insert_stream` named a `depends_on` id that is not present in the
    /// tree.
    UnknownParent(u32),
    /// `insert_stream` was given a weight outside `1..=256`, or an operation
    /// was attempted against the root stream where that is forbidden.
    InvalidArgument(String),
    /// `next()` found no active stream reachable from the root: every
    /// stream that could make progress is blocked.
    Deadlock,
}

impl fmt::Display for PriorityTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PriorityTreeError::DuplicateStream(id) => {
                write!(f, "stream {} is already present in the tree", id)
            }
            PriorityTreeError::UnknownStream(id) => {
                write!(f, "stream {} is not present in the tree", id)
            }
            PriorityTreeError::UnknownParent(id) => {
                write!(f, "depends_on stream {} is not present in the tree", id)
            }
            PriorityTreeError::InvalidArgument(ref msg) => write!(f, "invalid argument: {}", msg),
            PriorityTreeError::Deadlock => {
                write!(f, "no stream reachable from the root can make progress")
            }
        }
    }
}

impl error::Error for PriorityTreeError {}

/// Internal control-flow signal used by `StreamNode::schedule`. It never
/// escapes the crate: `PriorityTree::next` translates it into
/// `PriorityTreeError::Deadlock` at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EmptyError;
