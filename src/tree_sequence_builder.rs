//! Incremental construction of a tree sequence topology: nodes, paths
//! (edge sets ancestors copy from), mutations, and path compression.
//!
//! Modelled on `tsinfer`'s C `tree_sequence_builder_t`. The C source keeps
//! three AVL-tree indexes of `indexed_edge_t` (a live edge plus an
//! intrusive `next` pointer chaining a child's path) over an object heap.
//! Here the arena is a `Vec<Option<IndexedEdge>>` with a free list, the
//! per-child path is a chain of [`EdgeKey`]s through that arena, and the
//! three indexes are `BTreeMap`s keyed on tuples with the same sort order
//! the C comparators define.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::error::{Result, TsinferError};
use crate::flags::{BuilderFlags, NodeFlags};
use crate::ids::{NodeId, SiteId};

/// Time increment between a path-compression ancestor and its parents.
/// Power-of-two so it composes with `f64` time values losslessly.
const PC_ANCESTOR_INCREMENT: f64 = 1.0 / 65536.0;

/// A wrapper giving `f64` a total order, for use as a `BTreeMap` key
/// component. Node and edge times are never produced as NaN by this
/// crate, so `total_cmp` is equivalent to the natural order here.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Time(f64);

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A left-right interval assigning `child` to copy from `parent` (the
/// "Edge"): immutable once observed, the unit `dump`/`restore_edges`
/// exchange with a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub left: SiteId,
    pub right: SiteId,
    pub parent: NodeId,
    pub child: NodeId,
}

/// A handle into the builder's edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey(usize);

#[derive(Debug, Clone)]
struct IndexedEdge {
    edge: Edge,
    /// `child`'s time when this edge was allocated, cached so ordering
    /// indexes don't need to chase `time[child]` on every comparison.
    time: f64,
    next: Option<EdgeKey>,
}

type LeftKey = (SiteId, Time, NodeId);
type RightKey = (SiteId, Reverse<Time>, NodeId);
type PathKey = (SiteId, SiteId, NodeId, NodeId);

/// Construction-time options for a [`TreeSequenceBuilder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSequenceBuilderConfig {
    pub flags: BuilderFlags,
}

/// Incrementally builds a tree sequence's nodes, edges, and mutations.
///
/// Edges are installed a child's whole path at a time via [`Self::add_path`];
/// each child's edges form a singly linked chain through an internal arena,
/// kept contiguous (`prev.right == next.left`) and, optionally, compressed
/// against previously seen paths ([`BuilderFlags::COMPRESS_PATH`]). The
/// three live indexes (`left_index`, `right_index`, `path_index`) let
/// [`Self::freeze_indexes`] materialise fast sequential traversal order and
/// path compression find exact-match sub-paths to share.
#[derive(Debug)]
pub struct TreeSequenceBuilder {
    num_sites: usize,
    config: TreeSequenceBuilderConfig,
    time: Vec<f64>,
    node_flags: Vec<NodeFlags>,
    path: Vec<Option<EdgeKey>>,
    edges: Vec<Option<IndexedEdge>>,
    free_edges: Vec<EdgeKey>,
    left_index: BTreeMap<LeftKey, EdgeKey>,
    right_index: BTreeMap<RightKey, EdgeKey>,
    path_index: BTreeMap<PathKey, EdgeKey>,
    mutations: Vec<Vec<(NodeId, u8)>>,
    num_mutations: usize,
    frozen_left: Vec<Edge>,
    frozen_right: Vec<Edge>,
}

impl TreeSequenceBuilder {
    pub fn new(num_sites: usize, config: TreeSequenceBuilderConfig) -> Self {
        TreeSequenceBuilder {
            num_sites,
            config,
            time: Vec::new(),
            node_flags: Vec::new(),
            path: Vec::new(),
            edges: Vec::new(),
            free_edges: Vec::new(),
            left_index: BTreeMap::new(),
            right_index: BTreeMap::new(),
            path_index: BTreeMap::new(),
            mutations: vec![Vec::new(); num_sites],
            num_mutations: 0,
            frozen_left: Vec::new(),
            frozen_right: Vec::new(),
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn num_nodes(&self) -> usize {
        self.time.len()
    }

    /// Number of edges currently live in the index (the
    /// `num_edges`; the C source computes this as `avl_count(left_index)`).
    pub fn num_edges(&self) -> usize {
        self.left_index.len()
    }

    pub fn num_mutations(&self) -> usize {
        self.num_mutations
    }

    pub fn time_of(&self, node: NodeId) -> f64 {
        self.time[node.as_usize()]
    }

    pub fn flags_of(&self, node: NodeId) -> NodeFlags {
        self.node_flags[node.as_usize()]
    }

    /// Appends a node at the given time, returning its id.
    pub fn add_node(&mut self, time: f64, flags: NodeFlags) -> Result<NodeId> {
        self.time.try_reserve(1).map_err(|_| TsinferError::NoMemory)?;
        self.node_flags.try_reserve(1).map_err(|_| TsinferError::NoMemory)?;
        self.path.try_reserve(1).map_err(|_| TsinferError::NoMemory)?;
        let id = NodeId::from(self.time.len());
        self.time.push(time);
        self.node_flags.push(flags);
        self.path.push(None);
        Ok(id)
    }

    fn alloc_edge(&mut self, edge: Edge) -> Result<EdgeKey> {
        debug_assert!(self.time[edge.parent.as_usize()] > self.time[edge.child.as_usize()]);
        let time = self.time[edge.child.as_usize()];
        let indexed = IndexedEdge { edge, time, next: None };
        if let Some(key) = self.free_edges.pop() {
            self.edges[key.0] = Some(indexed);
            Ok(key)
        } else {
            self.edges.try_reserve(1).map_err(|_| TsinferError::NoMemory)?;
            let key = EdgeKey(self.edges.len());
            self.edges.push(Some(indexed));
            Ok(key)
        }
    }

    fn free_edge(&mut self, key: EdgeKey) {
        self.edges[key.0] = None;
        self.free_edges.push(key);
    }

    fn edge(&self, key: EdgeKey) -> &IndexedEdge {
        self.edges[key.0].as_ref().expect("dangling EdgeKey")
    }

    fn edge_mut(&mut self, key: EdgeKey) -> &mut IndexedEdge {
        self.edges[key.0].as_mut().expect("dangling EdgeKey")
    }

    fn left_key(e: &IndexedEdge) -> LeftKey {
        (e.edge.left, Time(e.time), e.edge.child)
    }

    fn right_key(e: &IndexedEdge) -> RightKey {
        (e.edge.right, Reverse(Time(e.time)), e.edge.child)
    }

    fn path_key(e: &IndexedEdge) -> PathKey {
        (e.edge.left, e.edge.right, e.edge.parent, e.edge.child)
    }

    fn index_edge(&mut self, key: EdgeKey) {
        let e = self.edge(key).clone();
        self.left_index.insert(Self::left_key(&e), key);
        self.right_index.insert(Self::right_key(&e), key);
        self.path_index.insert(Self::path_key(&e), key);
    }

    fn unindex_edge(&mut self, key: EdgeKey) {
        let e = self.edge(key).clone();
        self.left_index.remove(&Self::left_key(&e)).expect("edge was indexed");
        self.right_index.remove(&Self::right_key(&e)).expect("edge was indexed");
        self.path_index.remove(&Self::path_key(&e)).expect("edge was indexed");
    }

    fn index_path(&mut self, head: Option<EdgeKey>) {
        let mut cur = head;
        while let Some(key) = cur {
            self.index_edge(key);
            cur = self.edge(key).next;
        }
    }

    /// Looks up the path index for an edge sharing `(left, right, parent)`
    /// with `query`, regardless of child — the match `compress_path` shares
    /// a sub-path against. `path_index` sorts by `(left, right, parent,
    /// child)`, so the smallest-child match for this `(left, right,
    /// parent)` triple, if any, is the first entry at or after the
    /// all-zero-child search key.
    fn find_match(&self, left: SiteId, right: SiteId, parent: NodeId) -> Option<EdgeKey> {
        let search = (left, right, parent, NodeId(0));
        let (&(l, r, p, _), &key) = self.path_index.range(search..).next()?;
        if l == left && r == right && p == parent {
            Some(key)
        } else {
            None
        }
    }

    /// Merges adjacent edges in `child`'s path with matching `(right ==
    /// next.left, parent)`, without touching the indexes. Used after
    /// `add_path` installs a fresh, not-yet-indexed path.
    fn squash_edges(&mut self, child: NodeId) {
        let mut prev = self.path[child.as_usize()].expect("squash_edges needs a path");
        let mut cur = self.edge(prev).next;
        while let Some(x) = cur {
            let next = self.edge(x).next;
            let mergeable = self.edge(prev).edge.right == self.edge(x).edge.left
                && self.edge(prev).edge.parent == self.edge(x).edge.parent;
            if mergeable {
                let new_right = self.edge(x).edge.right;
                self.edge_mut(prev).edge.right = new_right;
                self.edge_mut(prev).next = next;
                self.free_edge(x);
            } else {
                prev = x;
            }
            cur = next;
        }
    }

    /// As [`Self::squash_edges`], but some edges in `child`'s chain may
    /// already be live in the indexes (marked by `NodeId::NULL` as a
    /// transient "currently unindexed" sentinel, matching the C source's
    /// `NULL_NODE` convention) from [`Self::make_pc_node`]'s rewiring.
    /// Unindexes an edge before merging it away, then reindexes everything
    /// still marked unindexed once the chain is stable.
    fn squash_indexed_edges(&mut self, child: NodeId) {
        let mut prev = self.path[child.as_usize()].expect("squash_indexed_edges needs a path");
        let mut cur = self.edge(prev).next;
        while let Some(x) = cur {
            let next = self.edge(x).next;
            let mergeable = self.edge(prev).edge.right == self.edge(x).edge.left
                && self.edge(prev).edge.parent == self.edge(x).edge.parent;
            if mergeable {
                if !self.edge(prev).edge.child.is_null() {
                    self.unindex_edge(prev);
                    self.edge_mut(prev).edge.child = NodeId::NULL;
                }
                if !self.edge(x).edge.child.is_null() {
                    self.unindex_edge(x);
                }
                let new_right = self.edge(x).edge.right;
                self.edge_mut(prev).edge.right = new_right;
                self.edge_mut(prev).next = next;
                self.free_edge(x);
            } else {
                prev = x;
            }
            cur = next;
        }

        let mut cur = self.path[child.as_usize()];
        while let Some(x) = cur {
            if self.edge(x).edge.child.is_null() {
                self.edge_mut(x).edge.child = child;
                self.index_edge(x);
            }
            cur = self.edge(x).next;
        }
    }

    /// Creates a synthetic ancestor covering the shared sub-path
    /// `mapped` maps `child`'s edges onto, and rewires both the new
    /// ancestor's path and the matched ancestors' edges to route through
    /// it.
    fn make_pc_node(&mut self, mapped: &[(EdgeKey, EdgeKey)]) -> Result<NodeId> {
        let mapped_child = self.edge(mapped[0].1).edge.child;
        let mapped_child_time = self.time[mapped_child.as_usize()];

        let mut min_parent_time = f64::INFINITY;
        for &(source, _) in mapped {
            let source_parent = self.edge(source).edge.parent;
            min_parent_time = min_parent_time.min(self.time[source_parent.as_usize()]);
        }
        min_parent_time -= PC_ANCESTOR_INCREMENT;
        if min_parent_time <= mapped_child_time {
            return Err(TsinferError::AssertionFailure(
                "path compression cannot place a pc-ancestor older than its children",
            ));
        }

        let pc_node = self.add_node(min_parent_time, NodeFlags::IS_PC_ANCESTOR)?;

        let mut head: Option<EdgeKey> = None;
        let mut tail: Option<EdgeKey> = None;
        for &(source, dest) in mapped {
            let source_edge = self.edge(source).edge;
            let new_key = self.alloc_edge(Edge {
                left: source_edge.left,
                right: source_edge.right,
                parent: source_edge.parent,
                child: pc_node,
            })?;
            if let Some(t) = tail {
                self.edge_mut(t).next = Some(new_key);
            } else {
                head = Some(new_key);
            }
            tail = Some(new_key);

            self.edge_mut(source).edge.parent = pc_node;
            // dest is currently indexed; mark it unindexed (NULL child) so
            // squash_indexed_edges below knows to reindex it under pc_node.
            self.unindex_edge(dest);
            self.edge_mut(dest).edge.parent = pc_node;
            self.edge_mut(dest).edge.child = NodeId::NULL;
        }
        self.path[pc_node.as_usize()] = head;
        self.squash_edges(pc_node);
        self.squash_indexed_edges(mapped_child);
        self.index_path(self.path[pc_node.as_usize()]);
        Ok(pc_node)
    }

    /// Rewrites `child`'s path to route maximal matching runs through
    /// shared ancestors, creating new path-compression nodes (or reusing
    /// existing ones) where a contiguous run of edges already has an exact
    /// match elsewhere in the index.
    fn compress_path(&mut self, child: NodeId) -> Result<()> {
        let mut chain = Vec::new();
        let mut cur = self.path[child.as_usize()];
        while let Some(key) = cur {
            chain.push(key);
            cur = self.edge(key).next;
        }

        let mut mapped: Vec<(EdgeKey, EdgeKey)> = Vec::new();
        let mut contig_offsets = vec![0usize];
        let mut last_match: Option<(SiteId, NodeId)> = None;
        for &c_edge in &chain {
            let (left, right, parent) = {
                let e = &self.edge(c_edge).edge;
                (e.left, e.right, e.parent)
            };
            if let Some(match_edge) = self.find_match(left, right, parent) {
                let starts_new_contig = match last_match {
                    Some((prev_right, prev_child)) => {
                        !(left == prev_right && self.edge(match_edge).edge.child == prev_child)
                    }
                    None => true,
                };
                if starts_new_contig && !mapped.is_empty() {
                    contig_offsets.push(mapped.len());
                }
                last_match = Some((right, self.edge(match_edge).edge.child));
                mapped.push((c_edge, match_edge));
            }
        }
        contig_offsets.push(mapped.len());

        for w in contig_offsets.windows(2) {
            let (start, end) = (w[0], w[1]);
            if end - start > 1 {
                let contig = &mapped[start..end];
                let mapped_child = self.edge(contig[0].1).edge.child;
                if self.node_flags[mapped_child.as_usize()].contains(NodeFlags::IS_PC_ANCESTOR) {
                    for &(source, _) in contig {
                        self.edge_mut(source).edge.parent = mapped_child;
                    }
                } else {
                    self.make_pc_node(contig)?;
                }
            }
        }
        self.squash_edges(child);
        Ok(())
    }

    /// Installs `child`'s path: one edge per `(left, right, parent)` triple,
    /// given in left-to-right genomic order. Optionally runs path
    /// compression and, if [`BuilderFlags::EXTENDED_CHECKS`] is set, a full
    /// consistency check afterwards.
    ///
    /// Validated atomically: if any edge fails validation, `child`'s path
    /// is left exactly as it was before the call (no partial path is ever
    /// installed).
    pub fn add_path(&mut self, child: NodeId, edges: &[(SiteId, SiteId, NodeId)]) -> Result<()> {
        if child.as_usize() >= self.num_nodes() {
            return Err(TsinferError::BadPathParent(child));
        }
        let child_time = self.time[child.as_usize()];

        let mut staged = Vec::with_capacity(edges.len());
        let mut prev: Option<(SiteId, SiteId, NodeId)> = None;
        for &(left, right, parent) in edges.iter() {
            if parent.as_usize() >= self.num_nodes() {
                return Err(TsinferError::BadPathParent(parent));
            }
            let parent_time = self.time[parent.as_usize()];
            if parent_time <= child_time {
                return Err(TsinferError::BadPathTime {
                    parent,
                    parent_time,
                    child,
                    child_time,
                });
            }
            if let Some((_, prev_right, _)) = prev {
                if prev_right != left {
                    return Err(TsinferError::NoncontiguousEdges {
                        child,
                        prev_right,
                        next_left: left,
                    });
                }
            }
            prev = Some((left, right, parent));
            staged.push((left, right, parent));
        }

        let mut head: Option<EdgeKey> = None;
        let mut tail: Option<EdgeKey> = None;
        for (left, right, parent) in staged {
            let key = self.alloc_edge(Edge { left, right, parent, child })?;
            if let Some(t) = tail {
                self.edge_mut(t).next = Some(key);
            } else {
                head = Some(key);
            }
            tail = Some(key);
        }
        self.path[child.as_usize()] = head;

        if self.config.flags.contains(BuilderFlags::COMPRESS_PATH) {
            self.compress_path(child)?;
        }
        self.index_path(self.path[child.as_usize()]);
        if self.config.flags.contains(BuilderFlags::EXTENDED_CHECKS) {
            self.check_state()?;
        }
        Ok(())
    }

    /// Records that `node` carries `derived_state` at `site`.
    pub fn add_mutation(&mut self, site: SiteId, node: NodeId, derived_state: u8) -> Result<()> {
        if site.as_usize() >= self.num_sites || node.as_usize() >= self.num_nodes() {
            return Err(TsinferError::BadInput("mutation site or node out of range"));
        }
        if self.mutations[site.as_usize()].is_empty() && derived_state != 1 {
            return Err(TsinferError::BadInput(
                "the first mutation at a site must have derived_state 1",
            ));
        }
        self.mutations[site.as_usize()].push((node, derived_state));
        self.num_mutations += 1;
        Ok(())
    }

    /// As [`Self::add_mutation`], for several mutations at once.
    pub fn add_mutations(&mut self, mutations: &[(SiteId, NodeId, u8)]) -> Result<()> {
        for &(site, node, derived_state) in mutations {
            self.add_mutation(site, node, derived_state)?;
        }
        Ok(())
    }

    /// Snapshots the live indexes into flat, sequential-traversal-order
    /// edge lists. Matching against ancestors added after this call sees
    /// nothing added since: edges added between freezes don't
    /// affect matching until the next `freeze_indexes`.
    pub fn freeze_indexes(&mut self) {
        self.frozen_left = self.left_index.values().map(|&k| self.edge(k).edge).collect();
        self.frozen_right = self.right_index.values().map(|&k| self.edge(k).edge).collect();
    }

    /// Edges in left-coordinate, increasing-time order, as of the last
    /// [`Self::freeze_indexes`] call.
    pub fn frozen_left_edges(&self) -> &[Edge] {
        &self.frozen_left
    }

    /// Edges in right-coordinate, decreasing-time order, as of the last
    /// [`Self::freeze_indexes`] call.
    pub fn frozen_right_edges(&self) -> &[Edge] {
        &self.frozen_right
    }

    /// Appends nodes restored from a prior session, in the order they were
    /// originally added.
    pub fn restore_nodes(&mut self, nodes: &[(f64, NodeFlags)]) -> Result<()> {
        for &(time, flags) in nodes {
            self.add_node(time, flags)?;
        }
        Ok(())
    }

    /// Appends edges restored from a prior session. `edges` must already
    /// be grouped by non-decreasing `child`, contiguous within each
    /// child's run (mirrors what [`Self::dump`] emits); violations are
    /// reported rather than silently accepted, since restored state skips
    /// `add_path`'s own reordering.
    pub fn restore_edges(&mut self, edges: &[Edge]) -> Result<()> {
        let mut prev: Option<Edge> = None;
        for &edge in edges {
            if let Some(p) = prev {
                if p.child > edge.child {
                    return Err(TsinferError::UnsortedEdges);
                }
                if p.child == edge.child && p.right > edge.left {
                    return Err(TsinferError::UnsortedEdges);
                }
            }
            let key = self.alloc_edge(edge)?;
            match self.path[edge.child.as_usize()] {
                None => self.path[edge.child.as_usize()] = Some(key),
                Some(head) => {
                    let mut last = head;
                    while let Some(n) = self.edge(last).next {
                        last = n;
                    }
                    self.edge_mut(last).next = Some(key);
                }
            }
            self.index_edge(key);
            prev = Some(edge);
        }
        self.freeze_indexes();
        Ok(())
    }

    /// Appends mutations restored from a prior session.
    pub fn restore_mutations(&mut self, mutations: &[(SiteId, NodeId, u8)]) -> Result<()> {
        self.add_mutations(mutations)
    }

    /// Emits the full current state to `sink`: nodes in id order, then
    /// each node's path edges, then one site row per site (sites serve as
    /// integer coordinates, ancestral state is always `"0"`), then
    /// per-site mutation rows in list order with parent pointers forming
    /// the per-site chain (the first mutation at a site gets
    /// `MutationId::NULL`). The sink's sequence length is set to
    /// `num_sites`.
    pub fn dump<S: crate::sink::TableSink>(&self, sink: &mut S) {
        sink.clear();
        sink.set_sequence_length(self.num_sites as f64);

        for node in 0..self.num_nodes() {
            sink.add_node(self.node_flags[node], self.time[node]);
        }
        for node in 0..self.num_nodes() {
            for edge in self.path_edges(NodeId::from(node)) {
                sink.add_edge(edge.left, edge.right, edge.parent, edge.child);
            }
        }
        for site in 0..self.num_sites {
            sink.add_site(site as f64, b"0");
        }

        for site in 0..self.num_sites {
            let mut parent = crate::ids::MutationId::NULL;
            for &(node, derived_state) in &self.mutations[site] {
                parent = sink.add_mutation(
                    SiteId::from(site),
                    node,
                    parent,
                    &[derived_state + b'0'],
                );
            }
        }
    }

    /// All edges currently making up `node`'s path, in genomic order.
    pub fn path_edges(&self, node: NodeId) -> Vec<Edge> {
        let mut out = Vec::new();
        let mut cur = self.path[node.as_usize()];
        while let Some(key) = cur {
            out.push(self.edge(key).edge);
            cur = self.edge(key).next;
        }
        out
    }

    /// Mutations recorded at `site`, in the order [`Self::add_mutation`]
    /// received them, oldest call first.
    pub fn mutations_at(&self, site: SiteId) -> &[(NodeId, u8)] {
        &self.mutations[site.as_usize()]
    }

    /// Walks every node's path and the three indexes, checking every
    /// invariant the C source's `tree_sequence_builder_check_state` /
    /// `tree_sequence_builder_check_index_integrity` assert. Runs
    /// unconditionally; callers opt into it at runtime via
    /// `BuilderFlags::EXTENDED_CHECKS` rather than this being compiled out
    /// in release builds.
    pub fn check_state(&self) -> Result<()> {
        let mut total_edges = 0usize;
        for child in 0..self.num_nodes() {
            let mut cur = self.path[child];
            let mut prev_right: Option<SiteId> = None;
            while let Some(key) = cur {
                let e = self.edge(key);
                if e.edge.child.as_usize() != child {
                    return Err(TsinferError::AssertionFailure("edge.child does not match its path"));
                }
                if let Some(pr) = prev_right {
                    if pr != e.edge.left {
                        return Err(TsinferError::AssertionFailure("path is not contiguous"));
                    }
                }
                prev_right = Some(e.edge.right);
                total_edges += 1;
                cur = e.next;
            }
        }
        if total_edges != self.left_index.len()
            || total_edges != self.right_index.len()
            || total_edges != self.path_index.len()
        {
            return Err(TsinferError::AssertionFailure("index size does not match live edge count"));
        }
        for child in 0..self.num_nodes() {
            let mut cur = self.path[child];
            while let Some(key) = cur {
                let e = self.edge(key).clone();
                if self.left_index.get(&Self::left_key(&e)) != Some(&key)
                    || self.right_index.get(&Self::right_key(&e)) != Some(&key)
                    || self.path_index.get(&Self::path_key(&e)) != Some(&key)
                {
                    return Err(TsinferError::AssertionFailure("edge missing from an index"));
                }
                cur = e.next;
            }
        }
        Ok(())
    }

    /// Traces a summary of this builder's shape at `log::Level::Trace`.
    /// Diagnostic only; mirrors `tree_sequence_builder_print_state`.
    pub fn log_state(&self) {
        log::trace!(
            "tree sequence builder: {} nodes, {} edges, {} mutations",
            self.num_nodes(),
            self.num_edges(),
            self.num_mutations(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(flags: BuilderFlags) -> TreeSequenceBuilder {
        TreeSequenceBuilder::new(3, TreeSequenceBuilderConfig { flags })
    }

    #[test]
    fn trivial_two_node_path() {
        let mut b = builder(BuilderFlags::empty());
        let root = b.add_node(1.0, NodeFlags::empty()).unwrap();
        let child = b.add_node(0.0, NodeFlags::empty()).unwrap();
        b.add_path(child, &[(SiteId(0), SiteId(3), root)]).unwrap();
        assert_eq!(b.num_edges(), 1);
        assert_eq!(b.path_edges(child), vec![Edge { left: SiteId(0), right: SiteId(3), parent: root, child }]);
    }

    #[test]
    fn rejects_out_of_range_parent() {
        let mut b = builder(BuilderFlags::empty());
        let child = b.add_node(0.0, NodeFlags::empty()).unwrap();
        let err = b.add_path(child, &[(SiteId(0), SiteId(3), NodeId(5))]).unwrap_err();
        assert!(matches!(err, TsinferError::BadPathParent(_)));
        assert_eq!(b.num_edges(), 0, "a rejected path must not leave a partial edge chain");
    }

    #[test]
    fn rejects_parent_not_older_than_child() {
        let mut b = builder(BuilderFlags::empty());
        let root = b.add_node(0.0, NodeFlags::empty()).unwrap();
        let child = b.add_node(1.0, NodeFlags::empty()).unwrap();
        let err = b.add_path(child, &[(SiteId(0), SiteId(3), root)]).unwrap_err();
        assert!(matches!(err, TsinferError::BadPathTime { .. }));
    }

    #[test]
    fn rejects_noncontiguous_edges() {
        let mut b = builder(BuilderFlags::empty());
        let root = b.add_node(1.0, NodeFlags::empty()).unwrap();
        let child = b.add_node(0.0, NodeFlags::empty()).unwrap();
        let err = b
            .add_path(child, &[(SiteId(0), SiteId(1), root), (SiteId(2), SiteId(3), root)])
            .unwrap_err();
        assert!(matches!(err, TsinferError::NoncontiguousEdges { .. }));
    }

    #[test]
    fn path_compression_creates_synthetic_node() {
        // Path compression shares a sub-*path*: two adjacent edges in one
        // child's path matching two adjacent edges in another child's path
        // at the same breakpoint, not merely one shared single-site edge.
        let mut b = builder(BuilderFlags::COMPRESS_PATH);
        let root1 = b.add_node(10.0, NodeFlags::empty()).unwrap();
        let root2 = b.add_node(9.0, NodeFlags::empty()).unwrap();
        let a = b.add_node(5.0, NodeFlags::empty()).unwrap();
        b.add_path(a, &[(SiteId(0), SiteId(1), root1), (SiteId(1), SiteId(2), root2)])
            .unwrap();

        let c = b.add_node(2.0, NodeFlags::empty()).unwrap();
        b.add_path(c, &[(SiteId(0), SiteId(1), root1), (SiteId(1), SiteId(2), root2)])
            .unwrap();

        let pc_nodes = (0..b.num_nodes())
            .filter(|&n| b.flags_of(NodeId::from(n)).contains(NodeFlags::IS_PC_ANCESTOR))
            .count();
        assert_eq!(pc_nodes, 1, "a matching two-edge sub-path should be factored into one synthetic ancestor");
        assert_eq!(b.path_edges(c).len(), 1, "c's path now routes through the single pc-ancestor edge");
        assert!(b.check_state().is_ok());
    }

    #[test]
    fn freeze_isolates_matching_from_new_edges() {
        let mut b = builder(BuilderFlags::COMPRESS_PATH);
        let root = b.add_node(10.0, NodeFlags::empty()).unwrap();
        let a = b.add_node(5.0, NodeFlags::empty()).unwrap();
        b.add_path(a, &[(SiteId(0), SiteId(3), root)]).unwrap();
        b.freeze_indexes();
        let snapshot_len = b.frozen_left_edges().len();

        let c = b.add_node(2.0, NodeFlags::empty()).unwrap();
        b.add_path(c, &[(SiteId(0), SiteId(3), root)]).unwrap();
        assert_eq!(b.frozen_left_edges().len(), snapshot_len, "unfrozen edges must not appear");
    }

    #[test]
    fn mutations_accumulate_per_site() {
        let mut b = builder(BuilderFlags::empty());
        let n0 = b.add_node(1.0, NodeFlags::empty()).unwrap();
        let n1 = b.add_node(0.0, NodeFlags::empty()).unwrap();
        b.add_mutations(&[(SiteId(0), n0, 1), (SiteId(0), n1, 0)]).unwrap();
        assert_eq!(b.num_mutations(), 2);
        assert_eq!(b.mutations_at(SiteId(0)), &[(n0, 1), (n1, 0)]);
    }

    #[test]
    fn dump_emits_nodes_edges_and_mutations() {
        let mut b = TreeSequenceBuilder::new(5, TreeSequenceBuilderConfig::default());
        let root = b.add_node(1.0, NodeFlags::empty()).unwrap();
        let child = b.add_node(0.0, NodeFlags::empty()).unwrap();
        b.add_path(child, &[(SiteId(0), SiteId(5), root)]).unwrap();

        let mut sink = crate::sink::TableCollection::new();
        b.dump(&mut sink);
        assert_eq!(sink.sequence_length, 5.0);
        assert_eq!(sink.nodes.len(), 2);
        assert_eq!(sink.edges.len(), 1);
        assert_eq!(sink.edges[0], crate::sink::EdgeRow {
            left: SiteId(0), right: SiteId(5), parent: root, child,
        });
        assert_eq!(sink.sites.len(), 5);
        assert!(sink.sites.iter().all(|s| s.ancestral_state == b"0"));
        assert!(sink.mutations.is_empty());
    }

    #[test]
    fn dump_then_restore_reproduces_frozen_indexes() {
        let mut b = builder(BuilderFlags::empty());
        let root = b.add_node(1.0, NodeFlags::empty()).unwrap();
        let c1 = b.add_node(0.0, NodeFlags::empty()).unwrap();
        b.add_path(c1, &[(SiteId(0), SiteId(2), root)]).unwrap();
        let c2 = b.add_node(0.0, NodeFlags::empty()).unwrap();
        b.add_path(c2, &[(SiteId(2), SiteId(3), root)]).unwrap();
        b.add_mutation(SiteId(0), c1, 1).unwrap();
        b.freeze_indexes();

        let mut sink = crate::sink::TableCollection::new();
        b.dump(&mut sink);

        let mut restored = builder(BuilderFlags::empty());
        restored
            .restore_nodes(&sink.nodes.iter().map(|n| (n.time, n.flags)).collect::<Vec<_>>())
            .unwrap();
        restored
            .restore_edges(
                &sink
                    .edges
                    .iter()
                    .map(|e| Edge { left: e.left, right: e.right, parent: e.parent, child: e.child })
                    .collect::<Vec<_>>(),
            )
            .unwrap();
        restored
            .restore_mutations(
                &sink
                    .mutations
                    .iter()
                    .map(|m| (m.site, m.node, m.derived_state[0] - b'0'))
                    .collect::<Vec<_>>(),
            )
            .unwrap();

        assert_eq!(restored.frozen_left_edges(), b.frozen_left_edges());
        assert_eq!(restored.frozen_right_edges(), b.frozen_right_edges());
    }

    /// Randomised construction, checked against the two invariants that
    /// hold regardless of the specific paths chosen: every live edge has
    /// `time[parent] > time[child]`, and `check_state` never objects.
    #[test]
    fn random_paths_satisfy_time_and_index_invariants() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let num_sites: usize = 4;
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut b = TreeSequenceBuilder::new(
            num_sites,
            TreeSequenceBuilderConfig { flags: BuilderFlags::COMPRESS_PATH },
        );

        let mut times = vec![100.0];
        let root = b.add_node(times[0], NodeFlags::empty()).unwrap();
        let mut nodes = vec![root];

        for i in 1..20 {
            let time = times[0] - i as f64;
            let node = b.add_node(time, NodeFlags::empty()).unwrap();
            times.push(time);
            let parent = nodes[rng.gen_range(0..nodes.len())];

            let breakpoint = rng.gen_range(1..num_sites);
            let edges = if rng.gen_bool(0.5) {
                vec![(SiteId::from(0usize), SiteId::from(num_sites), parent)]
            } else {
                vec![
                    (SiteId::from(0usize), SiteId::from(breakpoint), parent),
                    (SiteId::from(breakpoint), SiteId::from(num_sites), parent),
                ]
            };
            b.add_path(node, &edges).unwrap();
            nodes.push(node);
        }

        for &node in &nodes {
            for edge in b.path_edges(node) {
                assert!(b.time_of(edge.parent) > b.time_of(edge.child));
            }
        }
        assert!(b.check_state().is_ok());
    }
}
