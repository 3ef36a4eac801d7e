//! The closed error taxonomy for this crate.
//!
//! Modelled on `tskit`'s `TskitError` (a `thiserror`-derived enum threaded
//! through every table accessor): a small closed taxonomy of allocation
//! failure, bad input (with subtypes), and internal assertion failure.

use crate::ids::{NodeId, SiteId};

/// Errors produced by [`crate::ancestor_store::AncestorStore`] construction
/// and by [`crate::tree_sequence_builder::TreeSequenceBuilder`] operations.
#[derive(thiserror::Error, Debug)]
pub enum TsinferError {
    /// A fallible allocation (`Vec::try_reserve`) did not succeed.
    #[error("allocation failure")]
    NoMemory,

    /// `add_path`'s `parent` id is `>= num_nodes`.
    #[error("path parent {0} is out of range")]
    BadPathParent(NodeId),

    /// `time[parent] <= time[child]` for some edge in a path.
    #[error("path parent {parent} (time {parent_time}) is not older than child {child} (time {child_time})")]
    BadPathTime {
        parent: NodeId,
        parent_time: f64,
        child: NodeId,
        child_time: f64,
    },

    /// Adjacent edges in a path do not satisfy `prev.right == next.left`.
    #[error("edges for child {child} are noncontiguous: (.., {prev_right}) then ({next_left}, ..)")]
    NoncontiguousEdges {
        child: NodeId,
        prev_right: SiteId,
        next_left: SiteId,
    },

    /// `restore_edges` was given edges not grouped in ascending `child` order,
    /// or non-contiguous within a child's run.
    #[error("restored edges are not sorted by child")]
    UnsortedEdges,

    /// An internal invariant did not hold; notably, the path-compression
    /// time-floor check (`min(time[source_parents]) - epsilon <=
    /// time[mapped_child]`). Treated as a legitimate, unrecoverable-but-
    /// reportable error rather than an impossible case.
    #[error("assertion failure: {0}")]
    AssertionFailure(&'static str),

    /// An `AncestorStore` construction input violated one of its
    /// invariants (non-monotone positions, non-contiguous ancestor support,
    /// misgrouped focal sites/segments, ...).
    #[error("bad ancestor-store input: {0}")]
    BadInput(&'static str),
}

pub type Result<T> = std::result::Result<T, TsinferError>;
