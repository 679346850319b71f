//! # Node Network
//!
//! Owns the node and group arenas, the dirty set and the shared registry.
//! Mutation entry points live in [`mutation`](crate::mutation), the remake
//! pass in [`remake`](crate::remake), read-only views in
//! [`debug`](crate::debug).
//!
//! ## Threading
//!
//! A network is driven from one thread: mutations accumulate during a tick
//! and `remake` reconciles them once at the end of it. Group membership read
//! between the two reflects the previous pass.

use crate::config::{EngineSettings, NetworkConfig};
use crate::group::{GroupBehavior, NodeGroup};
use crate::node::Node;
use crate::primitives::FIRST_NET_ID;
use crate::registry::{GroupRegistry, VariantTable};
use crate::{EntityId, GroupId, NetId, NetworkError, NodeId};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A node destroyed since the last pass, waiting for its group's
/// `node_removed` hook.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Departure {
    pub(crate) node: NodeId,
    pub(crate) owner: EntityId,
}

/// The node-grouping engine.
#[derive(Debug)]
pub struct NodeNetwork {
    pub(crate) registry: Arc<GroupRegistry>,
    pub(crate) settings: EngineSettings,
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) groups: SlotMap<GroupId, NodeGroup>,
    /// Owner index: EntityId -> nodes it exposes.
    pub(crate) owners: BTreeMap<EntityId, BTreeSet<NodeId>>,
    /// Nodes whose membership may be stale.
    pub(crate) dirty: BTreeSet<NodeId>,
    /// Groups that lost members to destruction since the last pass.
    pub(crate) departures: BTreeMap<GroupId, Vec<Departure>>,
    /// Groups retired by the last pass, kept for the visualizer.
    pub(crate) retired: Vec<NodeGroup>,
    pub(crate) next_net_id: u64,
    pub(crate) tick: u64,
    pub(crate) faulted: bool,
}

impl Default for NodeNetwork {
    fn default() -> Self {
        Self::new(Arc::new(GroupRegistry::builtin()), EngineSettings::default())
    }
}

impl NodeNetwork {
    /// Create an empty network over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<GroupRegistry>, settings: EngineSettings) -> Self {
        Self {
            registry,
            settings,
            nodes: SlotMap::with_key(),
            groups: SlotMap::with_key(),
            owners: BTreeMap::new(),
            dirty: BTreeSet::new(),
            departures: BTreeMap::new(),
            retired: Vec::new(),
            next_net_id: FIRST_NET_ID,
            tick: 0,
            faulted: false,
        }
    }

    /// Create a network with its own registry built from `config`.
    pub fn from_config(
        config: &NetworkConfig,
        variants: &VariantTable,
    ) -> Result<Self, NetworkError> {
        let registry = GroupRegistry::from_config(config, variants)?;
        Ok(Self::new(Arc::new(registry), config.engine))
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Number of remake passes run so far.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// True once a consistency fault disabled the network.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Node::degree).sum::<usize>() / 2
    }

    /// Nodes exposed by an entity, in key order.
    pub fn nodes_of(&self, owner: EntityId) -> impl Iterator<Item = NodeId> + '_ {
        self.owners
            .get(&owner)
            .into_iter()
            .flat_map(|nodes| nodes.iter().copied())
    }

    /// The group `node` belonged to after the last pass.
    pub fn group_of(&self, node: NodeId) -> Result<Option<GroupId>, NetworkError> {
        self.nodes
            .get(node)
            .map(Node::group)
            .ok_or(NetworkError::NodeNotFound(node))
    }

    /// Check whether two nodes share a group.
    pub fn same_group(&self, a: NodeId, b: NodeId) -> Result<bool, NetworkError> {
        let ga = self.group_of(a)?;
        let gb = self.group_of(b)?;
        Ok(ga.is_some() && ga == gb)
    }

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&NodeGroup> {
        self.groups.get(id)
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Live groups in net-id order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &NodeGroup)> {
        let mut groups: Vec<_> = self.groups.iter().collect();
        groups.sort_by_key(|(_, group)| group.net_id());
        groups.into_iter()
    }

    /// Look a live group up by its diagnostic id.
    #[must_use]
    pub fn group_by_net_id(&self, net_id: NetId) -> Option<(GroupId, &NodeGroup)> {
        self.groups.iter().find(|(_, group)| group.net_id() == net_id)
    }

    /// Groups retired by the most recent pass.
    #[must_use]
    pub fn last_retired(&self) -> &[NodeGroup] {
        &self.retired
    }

    /// Borrow a group's payload as a concrete variant.
    #[must_use]
    pub fn payload<T: GroupBehavior>(&self, group: GroupId) -> Option<&T> {
        self.groups.get(group)?.behavior().downcast_ref::<T>()
    }

    /// Mutably borrow a group's payload as a concrete variant.
    pub fn payload_mut<T: GroupBehavior>(&mut self, group: GroupId) -> Option<&mut T> {
        self.groups.get_mut(group)?.behavior_mut().downcast_mut::<T>()
    }

    /// Mutably borrow the payload of the group `node` belongs to.
    pub fn payload_of_node_mut<T: GroupBehavior>(
        &mut self,
        node: NodeId,
    ) -> Result<Option<&mut T>, NetworkError> {
        match self.group_of(node)? {
            Some(group) => Ok(self.payload_mut::<T>(group)),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Pending work
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.dirty.contains(&node)
    }

    /// Number of dirty nodes waiting for the next pass.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Whether the next pass has anything to do.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || !self.departures.is_empty()
    }

    pub(crate) fn alloc_net_id(&mut self) -> NetId {
        let id = NetId(self.next_net_id);
        self.next_net_id = self.next_net_id.saturating_add(1);
        id
    }
}
