//! # Node Groups
//!
//! A `NodeGroup` is the engine-side record of one connected component:
//! its kind, diagnostic id, ordered member list and the boxed domain
//! payload. The payload implements [`GroupBehavior`], the capability set
//! the remake engine calls when membership changes.
//!
//! ## Hand-off contract
//!
//! Payload is owned by exactly one group at a time. When a component
//! splits, the old group's `split` hook receives every resulting part at
//! once; when components merge, the survivor's `merge` hook receives every
//! retiring group before any of them is dropped. How the payload is divided
//! or combined is up to the variant.

use crate::{EntityId, GroupKind, HookFault, NetId, NodeId};
use std::any::Any;
use std::fmt;

// =============================================================================
// HOOK ARGUMENTS
// =============================================================================

/// Context passed to [`GroupBehavior::initialize`] for a freshly built group.
#[derive(Debug, Clone, Copy)]
pub struct GroupInit<'a> {
    pub net_id: NetId,
    pub kind: &'a GroupKind,
    /// First node of the component in traversal order.
    pub source: NodeId,
    pub source_owner: EntityId,
    pub node_count: usize,
}

/// A member that left the group, either destroyed or stranded without a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedNode {
    pub node: NodeId,
    pub owner: EntityId,
    /// Member count immediately before this removal.
    pub members_before: usize,
}

/// One destination of a split: the group that now owns `nodes`.
pub struct SplitPart<'a> {
    pub net_id: NetId,
    /// Former members of the splitting group that moved to this part.
    pub nodes: &'a [NodeId],
    /// True when the destination group was created in this pass.
    pub fresh: bool,
    pub group: &'a mut dyn GroupBehavior,
}

impl fmt::Debug for SplitPart<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitPart")
            .field("net_id", &self.net_id)
            .field("nodes", &self.nodes.len())
            .field("fresh", &self.fresh)
            .finish()
    }
}

/// Everything a splitting group needs to hand its payload over.
#[derive(Debug)]
pub struct SplitSet<'a> {
    /// Members the splitting group keeps. Empty when it retires.
    pub kept: &'a [NodeId],
    pub parts: Vec<SplitPart<'a>>,
}

impl SplitSet<'_> {
    /// Size of the old group across all pieces.
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.kept
            .len()
            .saturating_add(self.parts.iter().map(|p| p.nodes.len()).sum::<usize>())
    }

    /// Whether the splitting group survives the pass.
    #[must_use]
    pub fn keeps_any(&self) -> bool {
        !self.kept.is_empty()
    }
}

/// A retiring group folded into a survivor.
pub struct MergedGroup<'a> {
    pub net_id: NetId,
    pub nodes: &'a [NodeId],
    pub group: &'a mut dyn GroupBehavior,
}

impl fmt::Debug for MergedGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedGroup")
            .field("net_id", &self.net_id)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

// =============================================================================
// GROUP BEHAVIOR TRAIT
// =============================================================================

/// Boxed copy of a payload. Implemented for every `Clone` variant.
pub trait BehaviorClone {
    fn clone_behavior(&self) -> Box<dyn GroupBehavior>;
}

impl<T: GroupBehavior + Clone + 'static> BehaviorClone for T {
    fn clone_behavior(&self) -> Box<dyn GroupBehavior> {
        Box::new(self.clone())
    }
}

/// Lifecycle hooks implemented by a group variant.
///
/// Every hook defaults to a no-op. A hook returning `Err` aborts the remake
/// of its kind partition and is reported to the caller of
/// [`NodeNetwork::remake`](crate::NodeNetwork::remake).
pub trait GroupBehavior: Any + fmt::Debug + BehaviorClone {
    /// Called once on a freshly constructed group, before it receives nodes.
    fn initialize(&mut self, _init: &GroupInit<'_>) -> Result<(), HookFault> {
        Ok(())
    }

    /// Called with nodes that joined this group in the current pass.
    fn load_nodes(&mut self, _nodes: &[NodeId]) -> Result<(), HookFault> {
        Ok(())
    }

    /// Called for each member that was destroyed or left without a group.
    fn node_removed(&mut self, _removed: &RemovedNode) -> Result<(), HookFault> {
        Ok(())
    }

    /// Called once when this group's members end up in two or more groups.
    fn split(&mut self, _split: &mut SplitSet<'_>) -> Result<(), HookFault> {
        Ok(())
    }

    /// Called on the survivor with every group retiring into it.
    fn merge(&mut self, _retiring: &mut [MergedGroup<'_>]) -> Result<(), HookFault> {
        Ok(())
    }

    /// Called right before the group is dropped.
    fn retire(&mut self) -> Result<(), HookFault> {
        Ok(())
    }

    /// Extra text for the node visualizer.
    fn debug_data(&self) -> Option<String> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn GroupBehavior {
    /// Borrow the payload as a concrete variant.
    pub fn downcast_ref<T: GroupBehavior>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the payload as a concrete variant.
    pub fn downcast_mut<T: GroupBehavior>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Stands in for a payload while the remake engine has it checked out.
#[derive(Debug, Clone)]
struct Detached;

impl GroupBehavior for Detached {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =============================================================================
// NODE GROUP
// =============================================================================

/// The engine's record of one live group.
#[derive(Debug)]
pub struct NodeGroup {
    kind: GroupKind,
    net_id: NetId,
    /// Members in traversal order of the pass that last rebuilt the group.
    nodes: Vec<NodeId>,
    removed: bool,
    remaking: bool,
    behavior: Box<dyn GroupBehavior>,
}

impl NodeGroup {
    pub(crate) fn new(kind: GroupKind, net_id: NetId, behavior: Box<dyn GroupBehavior>) -> Self {
        Self {
            kind,
            net_id,
            nodes: Vec::new(),
            removed: false,
            remaking: false,
            behavior,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &GroupKind {
        &self.kind
    }

    #[must_use]
    pub fn net_id(&self) -> NetId {
        self.net_id
    }

    /// Members as of the last completed remake pass.
    ///
    /// May still list a node destroyed since then; resolve through the
    /// network before use.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True only between retirement and drop.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// True while a remake pass holds this group.
    #[must_use]
    pub fn is_remaking(&self) -> bool {
        self.remaking
    }

    /// The domain payload.
    #[must_use]
    pub fn behavior(&self) -> &dyn GroupBehavior {
        self.behavior.as_ref()
    }

    /// The domain payload, for domain code between passes.
    pub fn behavior_mut(&mut self) -> &mut dyn GroupBehavior {
        self.behavior.as_mut()
    }

    /// Shortcut for `behavior().debug_data()`.
    #[must_use]
    pub fn debug_data(&self) -> Option<String> {
        self.behavior.debug_data()
    }

    pub(crate) fn set_nodes(&mut self, nodes: Vec<NodeId>) {
        self.nodes = nodes;
    }

    pub(crate) fn set_remaking(&mut self, remaking: bool) {
        self.remaking = remaking;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Check the payload out, leaving a placeholder behind.
    pub(crate) fn detach_behavior(&mut self) -> Box<dyn GroupBehavior> {
        std::mem::replace(&mut self.behavior, Box::new(Detached))
    }

    pub(crate) fn attach_behavior(&mut self, behavior: Box<dyn GroupBehavior>) {
        self.behavior = behavior;
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.behavior.as_any().is::<Detached>()
    }
}

// =============================================================================
// TESTS
// =============================================================================
