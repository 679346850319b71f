//! # Consistency Verification
//!
//! Full structural check of a network. Used by tests, by the CLI `verify`
//! command and, when `verify_after_remake` is set, after every pass.
//!
//! Checks, in order:
//! 1. Adjacency is symmetric and never points at a destroyed node
//! 2. Every node's group is live, of the node's kind, and lists the node
//! 3. No live group is removed, mid-remake, or missing its payload
//! 4. With nothing pending: each same-kind component is exactly one group,
//!    or groupless only when singletons are disabled for a lone node

use crate::network::NodeNetwork;
use crate::{GroupId, NetworkError, NodeId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

fn fault(message: String) -> NetworkError {
    NetworkError::Inconsistent(message)
}

impl NodeNetwork {
    /// Check every structural invariant.
    ///
    /// Returns the first violation as [`NetworkError::Inconsistent`]. This
    /// does not latch the fault flag; `remake` does that when it calls it.
    pub fn verify(&self) -> Result<(), NetworkError> {
        self.verify_edges()?;
        self.verify_membership()?;
        if !self.has_pending() {
            self.verify_partition()?;
        }
        Ok(())
    }

    fn verify_edges(&self) -> Result<(), NetworkError> {
        for (id, node) in &self.nodes {
            for neighbor in node.neighbors() {
                let other = self.nodes.get(neighbor).ok_or_else(|| {
                    fault(format!("{:?} has edge to destroyed {:?}", id, neighbor))
                })?;
                if !other.is_connected_to(id) {
                    return Err(fault(format!("edge {:?} -> {:?} is one-sided", id, neighbor)));
                }
            }
        }
        Ok(())
    }

    fn verify_membership(&self) -> Result<(), NetworkError> {
        for (id, node) in &self.nodes {
            let Some(group) = node.group() else { continue };
            let record = self
                .groups
                .get(group)
                .ok_or_else(|| fault(format!("{:?} points at retired group {:?}", id, group)))?;
            if record.kind() != node.kind() {
                return Err(fault(format!(
                    "{:?} of kind {} sits in {} group {}",
                    id,
                    node.kind(),
                    record.kind(),
                    record.net_id()
                )));
            }
            if !record.nodes().contains(&id) {
                return Err(fault(format!("{} does not list member {:?}", record.net_id(), id)));
            }
        }

        for (_, record) in &self.groups {
            let net_id = record.net_id();
            if record.is_removed() {
                return Err(fault(format!("{} is removed but still live", net_id)));
            }
            if record.is_remaking() {
                return Err(fault(format!("{} is stuck mid-remake", net_id)));
            }
            if record.is_detached() {
                return Err(fault(format!("{} lost its payload", net_id)));
            }
            let unique: BTreeSet<NodeId> = record.nodes().iter().copied().collect();
            if unique.len() != record.node_count() {
                return Err(fault(format!("{} lists a member twice", net_id)));
            }
        }
        Ok(())
    }

    fn verify_partition(&self) -> Result<(), NetworkError> {
        let mut claimed: BTreeMap<GroupId, usize> = BTreeMap::new();
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();

        for (start, node) in &self.nodes {
            if !seen.insert(start) {
                continue;
            }
            let kind = node.kind();
            let expected = node.group();
            let mut size = 0usize;
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                size += 1;
                let Some(member) = self.nodes.get(current) else { continue };
                if member.group() != expected {
                    return Err(fault(format!(
                        "{:?} and {:?} are connected but in different groups",
                        start, current
                    )));
                }
                for neighbor in member.neighbors() {
                    if self.nodes.get(neighbor).is_some_and(|n| n.kind() == kind)
                        && seen.insert(neighbor)
                    {
                        queue.push_back(neighbor);
                    }
                }
            }

            match expected {
                Some(group) => {
                    if claimed.insert(group, size).is_some() {
                        return Err(fault(format!("{:?} spans disconnected components", group)));
                    }
                    let listed = self.groups.get(group).map_or(0, |g| g.node_count());
                    if listed != size {
                        return Err(fault(format!(
                            "{:?} lists {} members for a component of {}",
                            group, listed, size
                        )));
                    }
                }
                None => {
                    if size > 1 || self.registry.singleton_groups(kind) {
                        return Err(fault(format!("{:?} was left without a group", start)));
                    }
                }
            }
        }

        if claimed.len() != self.groups.len() {
            return Err(fault(format!(
                "{} live groups but only {} own a component",
                self.groups.len(),
                claimed.len()
            )));
        }
        Ok(())
    }
}
