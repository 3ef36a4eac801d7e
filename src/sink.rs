//! The output table-collection sink interface, and a small in-memory
//! implementation used by tests.
//!
//! A real sink (on-disk tables, an FFI boundary into another tree-sequence
//! library, ...) is an external collaborator: [`TreeSequenceBuilder::dump`]
//! only needs something that can absorb rows in the order they're emitted.
//! [`TableCollection`] plays the same "good enough to drive the tests, not
//! a production implementation" role that `test_data.rs`'s
//! `simulate_two_treesequences` plays for table-backed round-trips in the
//! `tskit` bindings this crate's testing conventions follow.

use crate::flags::NodeFlags;
use crate::ids::{MutationId, NodeId, SiteId};

/// A write-only target for [`crate::tree_sequence_builder::TreeSequenceBuilder::dump`].
///
/// Ancestral state is always `b"0"`; derived state is `b"0"` or `b"1"`
/// (mutation parent pointers, not allele values, form the per-site chain).
pub trait TableSink {
    /// Empties every table. Called at the start of a `dump`.
    fn clear(&mut self);

    /// Sets the sequence length reported by the tables (sites serve as
    /// integer coordinates, so this is `num_sites` as a `f64`).
    fn set_sequence_length(&mut self, length: f64);

    /// Appends a node row, returning its id.
    fn add_node(&mut self, flags: NodeFlags, time: f64) -> NodeId;

    /// Appends an edge row.
    fn add_edge(&mut self, left: SiteId, right: SiteId, parent: NodeId, child: NodeId);

    /// Appends a site row, returning its id.
    fn add_site(&mut self, position: f64, ancestral_state: &[u8]) -> SiteId;

    /// Appends a mutation row. `parent` is the id of the previous mutation
    /// at this site in the chain, or `MutationId::NULL` for the first.
    fn add_mutation(
        &mut self,
        site: SiteId,
        node: NodeId,
        parent: MutationId,
        derived_state: &[u8],
    ) -> MutationId;
}

#[derive(Debug, Clone)]
pub struct NodeRow {
    pub flags: NodeFlags,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRow {
    pub left: SiteId,
    pub right: SiteId,
    pub parent: NodeId,
    pub child: NodeId,
}

#[derive(Debug, Clone)]
pub struct SiteRow {
    pub position: f64,
    pub ancestral_state: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MutationRow {
    pub site: SiteId,
    pub node: NodeId,
    pub parent: MutationId,
    pub derived_state: Vec<u8>,
}

/// An in-memory [`TableSink`], row order matching insertion order.
///
/// Not a production sink (no persistence, no FFI to another library's
/// table collection) — reference scaffolding `dump` can be tested against
/// without a real external system.
#[derive(Debug, Clone, Default)]
pub struct TableCollection {
    pub sequence_length: f64,
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<EdgeRow>,
    pub sites: Vec<SiteRow>,
    pub mutations: Vec<MutationRow>,
}

impl TableCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableSink for TableCollection {
    fn clear(&mut self) {
        self.sequence_length = 0.0;
        self.nodes.clear();
        self.edges.clear();
        self.sites.clear();
        self.mutations.clear();
    }

    fn set_sequence_length(&mut self, length: f64) {
        self.sequence_length = length;
    }

    fn add_node(&mut self, flags: NodeFlags, time: f64) -> NodeId {
        self.nodes.push(NodeRow { flags, time });
        NodeId::from(self.nodes.len() - 1)
    }

    fn add_edge(&mut self, left: SiteId, right: SiteId, parent: NodeId, child: NodeId) {
        self.edges.push(EdgeRow { left, right, parent, child });
    }

    fn add_site(&mut self, position: f64, ancestral_state: &[u8]) -> SiteId {
        self.sites.push(SiteRow {
            position,
            ancestral_state: ancestral_state.to_vec(),
        });
        SiteId::from(self.sites.len() - 1)
    }

    fn add_mutation(
        &mut self,
        site: SiteId,
        node: NodeId,
        parent: MutationId,
        derived_state: &[u8],
    ) -> MutationId {
        self.mutations.push(MutationRow {
            site,
            node,
            parent,
            derived_state: derived_state.to_vec(),
        });
        MutationId::from(self.mutations.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_empties_every_table() {
        let mut t = TableCollection::new();
        t.set_sequence_length(5.0);
        t.add_node(NodeFlags::empty(), 1.0);
        t.add_site(0.1, b"0");
        t.clear();
        assert_eq!(t.sequence_length, 0.0);
        assert!(t.nodes.is_empty());
        assert!(t.sites.is_empty());
    }

    #[test]
    fn add_mutation_chain_uses_caller_supplied_parent() {
        let mut t = TableCollection::new();
        let n = t.add_node(NodeFlags::empty(), 0.0);
        let s = t.add_site(0.0, b"0");
        let first = t.add_mutation(s, n, MutationId::NULL, b"1");
        let second = t.add_mutation(s, n, first, b"0");
        assert_eq!(t.mutations[0].parent, MutationId::NULL);
        assert_eq!(t.mutations[1].parent, first);
        assert_ne!(first, second);
    }
}
