//! `priority-tree`: a dependency tree and weighted round-robin scheduler
//! for HTTP/2-style stream prioritization.
//!
//! Given a dynamic forest of streams, each annotated with a parent and a
//! weight in `1..=256`, this crate answers one question repeatedly: which
//! stream should transmit next? It honours the dependency relationship (a
//! parent with pending data hides its descendants) and, among siblings,
//! distributes turns proportionally to weight.
//!
//! This is the priority-scheduling core only. The surrounding HTTP/2
//! framing layer, parsing `PRIORITY` frames off the wire, flow control,
//! actual byte transmission, is the caller's responsibility; this crate
//! just tracks the tree and answers `next()`.
//!
//! ```
//! use priority_tree::PriorityTree;
//!
//! let mut tree = PriorityTree::new();
//! tree.insert_stream(1, None, 16, false).unwrap();
//! tree.insert_stream(3, None, 16, false).unwrap();
//! assert!(tree.next().is_ok());
//! ```

mod error;
mod node;
mod tree;

pub use crate::error::{PriorityTreeError, Result};
pub use crate::node::DEFAULT_WEIGHT;
pub use crate::tree::{Cursor, PriorityTree, MAX_WEIGHT};
