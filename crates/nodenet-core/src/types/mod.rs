//! # Core Type Definitions
//!
//! This module contains the shared types of the node-grouping engine:
//! - Entity, node and group identifiers (`EntityId`, `NodeId`, `GroupId`, `NetId`)
//! - Group-kind tags (`GroupKind`)
//! - Error types (`NetworkError`, `HookFault`, `Hook`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so they can key `BTreeMap`/`BTreeSet`.
//! Arena keys are generational: a key that outlived its slot never resolves
//! to a newer occupant.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY & ARENA IDENTIFIERS
// =============================================================================

/// Identifier of the external entity that owns one or more nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

slotmap::new_key_type! {
    /// Generational handle of a node in the network arena.
    pub struct NodeId;

    /// Generational handle of a live group in the network arena.
    pub struct GroupId;
}

/// Diagnostic identifier of a group.
///
/// Assigned from a per-network counter starting at 1 and never reused,
/// so a visualizer can never confuse a retired group with a new one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NetId(pub u64);

impl NetId {
    /// Get the raw id value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

// =============================================================================
// GROUP KIND
// =============================================================================

/// Tag selecting which group variant a node's group uses.
///
/// Nodes of different kinds never share a group, even when an edge joins them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKind(pub String);

impl GroupKind {
    /// Create a new kind tag.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// HOOKS
// =============================================================================

/// The lifecycle hook a domain variant was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    Initialize,
    LoadNodes,
    NodeRemoved,
    Split,
    Merge,
    Retire,
}

impl Hook {
    /// Get the hook name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Hook::Initialize => "initialize",
            Hook::LoadNodes => "load_nodes",
            Hook::NodeRemoved => "node_removed",
            Hook::Split => "split",
            Hook::Merge => "merge",
            Hook::Retire => "retire",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure reported by a domain variant from one of its hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookFault(pub String);

impl HookFault {
    /// Create a fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the node network.
///
/// - Invalid mutations are rejected with the graph left unchanged
/// - `Inconsistent` and `Faulted` mean the group invariants no longer hold
/// - `Hook` carries a domain variant failure up to the tick driver
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No variant is registered for the group kind.
    #[error("Unknown group kind: {0}")]
    UnknownKind(GroupKind),

    /// The node does not exist (never created, or already destroyed).
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// The entity owns no nodes.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// An edge from a node to itself was requested.
    #[error("Self-loop rejected on node {0:?}")]
    SelfLoop(NodeId),

    /// The edge is already present.
    #[error("Edge already exists: {0:?} <-> {1:?}")]
    EdgeExists(NodeId, NodeId),

    /// The edge is not present.
    #[error("Edge not found: {0:?} <-> {1:?}")]
    EdgeNotFound(NodeId, NodeId),

    /// The group handle does not resolve to a live group.
    #[error("Group not found: {0:?}")]
    GroupNotFound(GroupId),

    /// A kind names a variant the variant table does not know.
    #[error("Kind '{kind}' names unknown variant '{variant}'")]
    UnknownVariant { kind: GroupKind, variant: String },

    /// A kind was registered twice.
    #[error("Duplicate group kind: {0}")]
    DuplicateKind(GroupKind),

    /// The configuration could not be parsed or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A domain hook failed during a remake pass.
    #[error("Hook '{hook}' failed on {net_id}: {source}")]
    Hook {
        hook: Hook,
        net_id: NetId,
        #[source]
        source: HookFault,
    },

    /// Group membership contradicts the graph.
    #[error("Internal consistency fault: {0}")]
    Inconsistent(String),

    /// A previous consistency fault disabled this network.
    #[error("Network is faulted after an earlier consistency violation")]
    Faulted,
}

impl NetworkError {
    /// Whether the error means the group invariants can no longer be trusted.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent(_) | Self::Faulted)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::collections::BTreeSet;

    #[test]
    fn net_id_display() {
        assert_eq!(NetId(7).to_string(), "net#7");
        assert_eq!(NetId(7).value(), 7);
    }

    #[test]
    fn group_kind_ordering_is_lexical() {
        let kinds: BTreeSet<GroupKind> = ["wire", "pipe", "apc"].into_iter().map(GroupKind::from).collect();
        let ordered: Vec<_> = kinds.iter().map(GroupKind::as_str).collect();
        assert_eq!(ordered, vec!["apc", "pipe", "wire"]);
    }

    #[test]
    fn stale_node_key_does_not_resolve() {
        let mut arena: SlotMap<NodeId, u8> = SlotMap::with_key();
        let first = arena.insert(1);
        arena.remove(first);
        let second = arena.insert(2);

        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&2));
        assert_ne!(first, second);
    }

    #[test]
    fn hook_error_reports_hook_and_net() {
        let err = NetworkError::Hook {
            hook: Hook::Split,
            net_id: NetId(3),
            source: HookFault::new("pool underflow"),
        };
        assert_eq!(err.to_string(), "Hook 'split' failed on net#3: pool underflow");
        assert!(!err.is_fatal());
        assert!(NetworkError::Faulted.is_fatal());
    }
}
