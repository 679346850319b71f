//! # Node
//!
//! A connection point owned by an entity. Adjacency is undirected and kept
//! symmetric by the mutation API; the group pointer is written only by the
//! remake engine.

use crate::{EntityId, GroupId, GroupKind, NodeId};
use std::collections::BTreeSet;

/// A vertex of the node network.
#[derive(Debug, Clone)]
pub struct Node {
    owner: EntityId,
    kind: GroupKind,
    /// Neighbors in key order, so traversal is deterministic.
    edges: BTreeSet<NodeId>,
    group: Option<GroupId>,
    /// Set by the first pass that reaches this node.
    placed: bool,
}

impl Node {
    pub(crate) fn new(owner: EntityId, kind: GroupKind) -> Self {
        Self {
            owner,
            kind,
            edges: BTreeSet::new(),
            group: None,
            placed: false,
        }
    }

    /// The entity that owns this node.
    #[must_use]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// The kind of group this node may join.
    #[must_use]
    pub fn kind(&self) -> &GroupKind {
        &self.kind
    }

    /// The group this node belonged to after the last remake pass.
    ///
    /// `None` for a node created or detached since then, or an isolated
    /// node whose kind does not form singleton groups.
    #[must_use]
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Whether a completed remake pass has seen this node.
    ///
    /// A node added since the last pass is unplaced: it has no group yet
    /// but is not groupless in the committed view either.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// Neighbors in ascending key order.
    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.iter().copied()
    }

    /// Number of edges.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// Check for an edge to `other`.
    #[must_use]
    pub fn is_connected_to(&self, other: NodeId) -> bool {
        self.edges.contains(&other)
    }

    pub(crate) fn insert_edge(&mut self, other: NodeId) -> bool {
        self.edges.insert(other)
    }

    pub(crate) fn remove_edge(&mut self, other: NodeId) -> bool {
        self.edges.remove(&other)
    }

    pub(crate) fn take_edges(&mut self) -> BTreeSet<NodeId> {
        std::mem::take(&mut self.edges)
    }

    pub(crate) fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
        self.placed = true;
    }
}
