//! # Topology Mutation API
//!
//! The only way to change the graph. Every entry point:
//! - Validates its input and leaves the graph untouched on error
//! - Updates adjacency symmetrically
//! - Marks the affected nodes dirty for the next remake pass
//! - Never touches group membership itself
//!
//! Marking is idempotent: the dirty set is a set.

use crate::network::{Departure, NodeNetwork};
use crate::node::Node;
use crate::{EntityId, GroupKind, NetworkError, NodeId};

impl NodeNetwork {
    /// Create a node owned by `owner`. It stays groupless until the next pass.
    pub fn add_node(
        &mut self,
        owner: EntityId,
        kind: impl Into<GroupKind>,
    ) -> Result<NodeId, NetworkError> {
        let kind = kind.into();
        if !self.registry.contains(&kind) {
            return Err(NetworkError::UnknownKind(kind));
        }

        let id = self.nodes.insert(Node::new(owner, kind));
        self.owners.entry(owner).or_default().insert(id);
        self.dirty.insert(id);
        tracing::trace!(node = ?id, %owner, "node added");
        Ok(id)
    }

    /// Destroy a node together with all of its edges.
    ///
    /// Neighbors become dirty; the node leaves the dirty set immediately and
    /// its group is told on the next pass.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), NetworkError> {
        let mut node = self.nodes.remove(id).ok_or(NetworkError::NodeNotFound(id))?;

        for neighbor in node.take_edges() {
            if let Some(other) = self.nodes.get_mut(neighbor) {
                other.remove_edge(id);
                self.dirty.insert(neighbor);
            }
        }
        self.dirty.remove(&id);

        if let Some(group) = node.group() {
            self.departures.entry(group).or_default().push(Departure {
                node: id,
                owner: node.owner(),
            });
        }

        let owner = node.owner();
        if let Some(owned) = self.owners.get_mut(&owner) {
            owned.remove(&id);
            if owned.is_empty() {
                self.owners.remove(&owner);
            }
        }

        tracing::trace!(node = ?id, %owner, "node removed");
        Ok(())
    }

    /// Destroy every node an entity owns. Returns how many were removed.
    pub fn remove_entity(&mut self, owner: EntityId) -> Result<usize, NetworkError> {
        let owned = self
            .owners
            .get(&owner)
            .cloned()
            .ok_or(NetworkError::EntityNotFound(owner))?;

        for id in &owned {
            self.remove_node(*id)?;
        }
        Ok(owned.len())
    }

    /// Add an undirected edge.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<(), NetworkError> {
        self.check_pair(a, b)?;
        if self.nodes.get(a).is_some_and(|n| n.is_connected_to(b)) {
            return Err(NetworkError::EdgeExists(a, b));
        }

        if let Some(node) = self.nodes.get_mut(a) {
            node.insert_edge(b);
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.insert_edge(a);
        }
        self.dirty.insert(a);
        self.dirty.insert(b);
        Ok(())
    }

    /// Remove an undirected edge.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> Result<(), NetworkError> {
        self.check_pair(a, b)?;
        if !self.nodes.get(a).is_some_and(|n| n.is_connected_to(b)) {
            return Err(NetworkError::EdgeNotFound(a, b));
        }

        if let Some(node) = self.nodes.get_mut(a) {
            node.remove_edge(b);
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.remove_edge(a);
        }
        self.dirty.insert(a);
        self.dirty.insert(b);
        Ok(())
    }

    /// Ask for `node` to be reflooded on the next pass without changing edges.
    pub fn mark_dirty(&mut self, node: NodeId) -> Result<(), NetworkError> {
        if !self.nodes.contains_key(node) {
            return Err(NetworkError::NodeNotFound(node));
        }
        self.dirty.insert(node);
        Ok(())
    }

    fn check_pair(&self, a: NodeId, b: NodeId) -> Result<(), NetworkError> {
        if !self.nodes.contains_key(a) {
            return Err(NetworkError::NodeNotFound(a));
        }
        if !self.nodes.contains_key(b) {
            return Err(NetworkError::NodeNotFound(b));
        }
        if a == b {
            return Err(NetworkError::SelfLoop(a));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
