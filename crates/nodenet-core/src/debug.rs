//! # Debug Views
//!
//! Serializable snapshots of a network for visualizers and the HTTP
//! debug server. Snapshots are plain data: ids are rendered as net ids and
//! entity ids, never as arena keys.
//!
//! Membership is reported as committed by the last completed pass: a group
//! lists the members it was given then, including members destroyed since,
//! and nodes added since are neither grouped nor groupless. Graph facts
//! (node and edge counts, degrees) and `pending` are live.

use crate::network::NodeNetwork;
use crate::{EntityId, GroupId, NetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub owner: EntityId,
    pub degree: usize,
}

/// One live group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub net_id: NetId,
    pub kind: String,
    pub variant: String,
    pub node_count: usize,
    pub nodes: Vec<NodeSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_data: Option<String>,
}

/// Whole-network view, groups in net-id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub tick: u64,
    /// Dirty nodes waiting for the next pass.
    pub pending: usize,
    pub groups: Vec<GroupSnapshot>,
    /// Nodes the last pass left without a group.
    pub groupless: Vec<NodeSnapshot>,
}

/// Aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub group_count: usize,
    pub groupless_nodes: usize,
    pub largest_group: usize,
    pub groups_by_kind: BTreeMap<String, usize>,
}

impl NodeNetwork {
    /// Snapshot a single group.
    ///
    /// A member destroyed since the last pass keeps its owner and reports
    /// degree zero.
    #[must_use]
    pub fn group_snapshot(&self, id: GroupId) -> Option<GroupSnapshot> {
        let group = self.groups.get(id)?;
        let departed = self.departures.get(&id).map_or(&[][..], Vec::as_slice);
        let nodes: Vec<NodeSnapshot> = group
            .nodes()
            .iter()
            .filter_map(|n| match self.nodes.get(*n) {
                Some(node) => Some(NodeSnapshot {
                    owner: node.owner(),
                    degree: node.degree(),
                }),
                None => departed.iter().find(|d| d.node == *n).map(|d| NodeSnapshot {
                    owner: d.owner,
                    degree: 0,
                }),
            })
            .collect();
        Some(GroupSnapshot {
            net_id: group.net_id(),
            kind: group.kind().to_string(),
            variant: self.registry.variant(group.kind()).unwrap_or_default().to_string(),
            node_count: group.node_count(),
            nodes,
            debug_data: group.debug_data(),
        })
    }

    /// Snapshot everything.
    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        let groups = self
            .groups()
            .filter_map(|(id, _)| self.group_snapshot(id))
            .collect();
        let groupless = self
            .nodes
            .values()
            .filter(|node| node.is_placed() && node.group().is_none())
            .map(|node| NodeSnapshot {
                owner: node.owner(),
                degree: node.degree(),
            })
            .collect();
        NetworkSnapshot {
            tick: self.tick,
            pending: self.dirty_count(),
            groups,
            groupless,
        }
    }

    /// Live group count per kind.
    #[must_use]
    pub fn group_count_by_kind(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for group in self.groups.values() {
            *counts.entry(group.kind().to_string()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn metrics(&self) -> NetworkMetrics {
        NetworkMetrics {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            group_count: self.group_count(),
            groupless_nodes: self
                .nodes
                .values()
                .filter(|n| n.is_placed() && n.group().is_none())
                .count(),
            largest_group: self.groups.values().map(|g| g.node_count()).max().unwrap_or(0),
            groups_by_kind: self.group_count_by_kind(),
        }
    }
}
