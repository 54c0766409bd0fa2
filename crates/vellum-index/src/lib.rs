//! Concurrent disk-backed B+Tree index for Vellum.
//!
//! The tree maps fixed-width keys, ordered by a pluggable comparator, to
//! fixed-size record identifiers. All key-value pairs live in leaf pages
//! chained for sequential scans; internal pages hold only separator keys.
//! Pages are cached by the `vellum-buffer` page store and pinned for the
//! duration of each access.
//!
//! Concurrency follows latch crabbing: every operation descends from the
//! root taking per-page latches in parent-to-child order, releasing held
//! ancestors as soon as the newly latched child is safe (cannot split or
//! merge into its parent). Readers couple latches one level at a time;
//! writers keep the unsafe ancestor chain latched in a FIFO queue until
//! the structural change is resolved.

mod context;
mod dump;
mod header;
mod iter;
mod key;
mod node;
mod tree;

pub use iter::TreeIter;
pub use key::{IndexKey, KeyComparator, OrdComparator};
pub use tree::BPlusTree;

pub use vellum_common::{PageId, RecordId};
