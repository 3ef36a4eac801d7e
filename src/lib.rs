//! Core data structures for a tree-sequence inference engine: an
//! [`ancestor_store`] that compactly represents a set of haplotype
//! ancestors as per-site run-length segments, and a
//! [`tree_sequence_builder`] that incrementally assembles a genealogical
//! graph (nodes, edges, mutations) from copying paths, with path
//! compression as its distinguishing algorithm.
//!
//! The matching algorithm that *produces* copying paths, input parsing,
//! a command-line front-end, and a production table-collection sink are
//! external collaborators; this crate only defines the interfaces they
//! plug into ([`sink::TableSink`]) and the structures they read and
//! write.

pub mod ancestor_store;
pub mod error;
pub mod flags;
pub mod ids;
pub mod sink;
pub mod tree_sequence_builder;

pub use ancestor_store::{AncestorData, AncestorStore, AncestorStoreBuilder, Epoch, Segment};
pub use error::{Result, TsinferError};
pub use flags::{BuilderFlags, NodeFlags};
pub use ids::{AncestorId, MutationId, NodeId, SiteId};
pub use sink::{MutationRow, TableCollection, TableSink};
pub use tree_sequence_builder::{Edge, TreeSequenceBuilder, TreeSequenceBuilderConfig};
