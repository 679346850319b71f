//! # Remake Tier Tests (T0-T3)
//!
//! ## Tiers
//! - T0: Group formation
//! - T1: Splits
//! - T2: Merges and kind boundaries
//! - T3: Destruction and failure handling

use nodenet_core::{
    EntityId, GroupBehavior, GroupKind, GroupRegistry, Hook, HookFault, MergedGroup, NetId,
    NetworkError, NodeId, NodeNetwork, SplitSet,
};
use std::any::Any;
use std::sync::Arc;

/// Variant that records every hook it receives.
#[derive(Debug, Clone, Default)]
struct Recorder {
    calls: Vec<String>,
}

impl Recorder {
    fn construct(_kind: &GroupKind) -> Box<dyn GroupBehavior> {
        Box::new(Self::default())
    }
}

impl GroupBehavior for Recorder {
    fn initialize(&mut self, init: &nodenet_core::GroupInit<'_>) -> Result<(), HookFault> {
        self.calls.push(format!("initialize:{}", init.node_count));
        Ok(())
    }

    fn load_nodes(&mut self, nodes: &[NodeId]) -> Result<(), HookFault> {
        self.calls.push(format!("load:{}", nodes.len()));
        Ok(())
    }

    fn node_removed(&mut self, removed: &nodenet_core::RemovedNode) -> Result<(), HookFault> {
        self.calls.push(format!("removed:{}", removed.members_before));
        Ok(())
    }

    fn split(&mut self, split: &mut SplitSet<'_>) -> Result<(), HookFault> {
        let parts: Vec<usize> = split.parts.iter().map(|p| p.nodes.len()).collect();
        self.calls.push(format!("split:{}:{:?}", split.kept.len(), parts));
        Ok(())
    }

    fn merge(&mut self, retiring: &mut [MergedGroup<'_>]) -> Result<(), HookFault> {
        let ids: Vec<u64> = retiring.iter().map(|m| m.net_id.value()).collect();
        self.calls.push(format!("merge:{:?}", ids));
        Ok(())
    }

    fn retire(&mut self) -> Result<(), HookFault> {
        self.calls.push("retire".to_string());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn recording_network(singletons: bool) -> NodeNetwork {
    let registry = GroupRegistry::builder()
        .kind("cable", "recorder", Recorder::construct, singletons)
        .kind("duct", "recorder", Recorder::construct, singletons)
        .build();
    NodeNetwork::new(Arc::new(registry), Default::default())
}

fn add(network: &mut NodeNetwork, owner: u64, kind: &str) -> NodeId {
    network.add_node(EntityId(owner), kind).expect("add")
}

fn calls(network: &NodeNetwork, node: NodeId) -> Vec<String> {
    let group = network.group_of(node).expect("node").expect("group");
    network
        .payload::<Recorder>(group)
        .map(|r| r.calls.clone())
        .unwrap_or_default()
}

fn net_id(network: &NodeNetwork, node: NodeId) -> Option<NetId> {
    let group = network.group_of(node).expect("node")?;
    network.group(group).map(|g| g.net_id())
}

/// A-B-C in a line, grouped.
fn abc(network: &mut NodeNetwork) -> [NodeId; 3] {
    let a = add(network, 1, "cable");
    let b = add(network, 2, "cable");
    let c = add(network, 3, "cable");
    network.connect(a, b).expect("connect");
    network.connect(b, c).expect("connect");
    network.remake().expect("remake");
    [a, b, c]
}

// =============================================================================
// TIER T0: GROUP FORMATION
// =============================================================================

mod t0_formation {
    use super::*;

    /// T0.1: A line of three forms exactly one group.
    #[test]
    fn line_forms_one_group() {
        let mut network = recording_network(true);
        let [a, b, c] = abc(&mut network);

        assert_eq!(network.group_count(), 1);
        assert!(network.same_group(a, b).expect("nodes"));
        assert!(network.same_group(b, c).expect("nodes"));
        assert_eq!(calls(&network, a), vec!["initialize:3", "load:3"]);
        network.verify().expect("consistent");
    }

    /// T0.2: Repeating a pass with no mutations is a no-op.
    #[test]
    fn idle_pass_is_noop() {
        let mut network = recording_network(true);
        let [a, ..] = abc(&mut network);
        let before = net_id(&network, a);

        let report = network.remake().expect("remake");

        assert!(report.is_noop());
        assert_eq!(net_id(&network, a), before);
        assert_eq!(calls(&network, a).len(), 2);
    }

    /// T0.3: Membership changes only at the pass.
    #[test]
    fn membership_deferred_until_remake() {
        let mut network = recording_network(true);
        let [_, _, c] = abc(&mut network);
        let d = add(&mut network, 4, "cable");
        network.connect(c, d).expect("connect");

        assert_eq!(network.group_of(d).expect("node"), None);
        network.remake().expect("remake");
        assert!(network.same_group(c, d).expect("nodes"));
        assert_eq!(network.group_count(), 1);
    }
}

// =============================================================================
// TIER T1: SPLITS
// =============================================================================

mod t1_splits {
    use super::*;

    /// T1.1: Cutting B-C yields {A,B} and {C} with one split call.
    #[test]
    fn cut_edge_splits_once() {
        let mut network = recording_network(true);
        let [a, b, c] = abc(&mut network);
        let original = net_id(&network, a);

        network.disconnect(b, c).expect("disconnect");
        let report = network.remake().expect("remake");

        assert_eq!(report.splits, 1);
        assert_eq!(network.group_count(), 2);
        assert!(network.same_group(a, b).expect("nodes"));
        assert!(!network.same_group(b, c).expect("nodes"));
        assert_eq!(net_id(&network, a), original);
        assert_eq!(calls(&network, a).last().map(String::as_str), Some("split:2:[1]"));
        assert_eq!(calls(&network, c), vec!["initialize:1", "load:1"]);
        network.verify().expect("consistent");
    }

    /// T1.2: Removing a middle node splits the remainder.
    #[test]
    fn removing_bridge_splits() {
        let mut network = recording_network(true);
        let [a, b, c] = abc(&mut network);

        network.remove_node(b).expect("remove");
        network.remake().expect("remake");

        assert_eq!(network.group_count(), 2);
        assert!(!network.same_group(a, c).expect("nodes"));
        let history = calls(&network, a);
        assert!(history.contains(&"removed:3".to_string()));
        assert!(history.contains(&"split:1:[1]".to_string()));
    }

    /// T1.3: Without singletons a cut-off node is dropped, not split off.
    #[test]
    fn lone_fragment_stranded_without_singletons() {
        let mut network = recording_network(false);
        let [a, b, c] = abc(&mut network);

        network.disconnect(b, c).expect("disconnect");
        let report = network.remake().expect("remake");

        assert_eq!(report.splits, 0);
        assert_eq!(report.stranded, 1);
        assert_eq!(network.group_of(c).expect("node"), None);
        assert_eq!(calls(&network, a).last().map(String::as_str), Some("removed:3"));
        network.verify().expect("consistent");
    }
}

// =============================================================================
// TIER T2: MERGES AND KIND BOUNDARIES
// =============================================================================

mod t2_merges {
    use super::*;

    /// T2.1: Bridging {A,B} and {C,D} merges into the lower net id.
    #[test]
    fn bridge_merges_groups() {
        let mut network = recording_network(true);
        let a = add(&mut network, 1, "cable");
        let b = add(&mut network, 2, "cable");
        let c = add(&mut network, 3, "cable");
        let d = add(&mut network, 4, "cable");
        network.connect(a, b).expect("connect");
        network.connect(c, d).expect("connect");
        network.remake().expect("remake");
        let left = net_id(&network, a).expect("grouped");
        let right = net_id(&network, c).expect("grouped");

        network.connect(b, c).expect("connect");
        let report = network.remake().expect("remake");

        assert_eq!(report.merges, 1);
        assert_eq!(network.group_count(), 1);
        assert_eq!(net_id(&network, d), Some(left));
        let history = calls(&network, a);
        assert!(history.contains(&format!("merge:[{}]", right.value())));
        assert_eq!(history.last().map(String::as_str), Some("load:2"));

        let retired = network.last_retired();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].net_id(), right);
        let payload = retired[0].behavior().downcast_ref::<Recorder>().expect("recorder");
        assert_eq!(payload.calls.last().map(String::as_str), Some("retire"));
        network.verify().expect("consistent");
    }

    /// T2.2: A node of another kind between B and C never bridges them.
    #[test]
    fn foreign_kind_does_not_bridge() {
        let mut network = recording_network(true);
        let [_, b, c] = abc(&mut network);
        network.disconnect(b, c).expect("disconnect");
        let e = add(&mut network, 5, "duct");
        network.connect(b, e).expect("connect");
        network.connect(e, c).expect("connect");

        network.remake().expect("remake");

        assert!(!network.same_group(b, c).expect("nodes"));
        assert!(!network.same_group(b, e).expect("nodes"));
        assert!(!network.same_group(e, c).expect("nodes"));
        assert!(network.group_of(e).expect("node").is_some());
        network.verify().expect("consistent");
    }

    /// T2.3: Without singletons the foreign node stays groupless.
    #[test]
    fn foreign_kind_groupless_without_singletons() {
        let mut network = recording_network(false);
        let [_, b, _] = abc(&mut network);
        let e = add(&mut network, 5, "duct");
        network.connect(b, e).expect("connect");

        network.remake().expect("remake");

        assert_eq!(network.group_of(e).expect("node"), None);
        assert_eq!(network.group_count(), 1);
    }
}

// =============================================================================
// TIER T3: DESTRUCTION AND FAILURES
// =============================================================================

mod t3_destruction {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Stubborn;

    impl GroupBehavior for Stubborn {
        fn merge(&mut self, _retiring: &mut [MergedGroup<'_>]) -> Result<(), HookFault> {
            Err(HookFault::new("pressure mismatch"))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn stubborn(_kind: &GroupKind) -> Box<dyn GroupBehavior> {
        Box::new(Stubborn)
    }

    /// T3.1: Destroying A leaves {B,C} in the original group.
    #[test]
    fn destroying_member_shrinks_group() {
        let mut network = recording_network(true);
        let [a, b, c] = abc(&mut network);
        let original = net_id(&network, b);

        network.remove_node(a).expect("remove");
        assert!(matches!(network.group_of(a), Err(NetworkError::NodeNotFound(_))));
        network.remake().expect("remake");

        assert_eq!(net_id(&network, b), original);
        assert!(network.same_group(b, c).expect("nodes"));
        let group = network.group_of(b).expect("node").expect("group");
        assert_eq!(network.group(group).map(|g| g.node_count()), Some(2));
        assert!(calls(&network, b).contains(&"removed:3".to_string()));
        network.verify().expect("consistent");
    }

    /// T3.2: Tearing down an entity removes every node it exposes.
    #[test]
    fn entity_teardown_retires_group() {
        let mut network = recording_network(true);
        let a = add(&mut network, 7, "cable");
        let b = add(&mut network, 7, "duct");
        network.connect(a, b).expect("connect");
        network.remake().expect("remake");
        assert_eq!(network.group_count(), 2);

        assert_eq!(network.remove_entity(EntityId(7)).expect("teardown"), 2);
        let report = network.remake().expect("remake");

        assert_eq!(report.retired, 2);
        assert_eq!(network.group_count(), 0);
        assert_eq!(network.node_count(), 0);
    }

    /// T3.3: A failing merge hook aborts the pass and requeues it.
    #[test]
    fn failed_merge_requeues() {
        let registry = GroupRegistry::builder()
            .kind("gas", "stubborn", stubborn, true)
            .build();
        let mut network = NodeNetwork::new(Arc::new(registry), Default::default());
        let a = add(&mut network, 1, "gas");
        let b = add(&mut network, 2, "gas");
        network.remake().expect("remake");
        let before = (network.group_of(a).expect("node"), network.group_of(b).expect("node"));

        network.connect(a, b).expect("connect");
        let result = network.remake();

        assert!(matches!(result, Err(NetworkError::Hook { hook: Hook::Merge, .. })));
        assert!(!network.is_faulted());
        assert!(network.has_pending());
        assert_eq!((network.group_of(a).expect("node"), network.group_of(b).expect("node")), before);
        assert_eq!(network.group_count(), 2);

        network.disconnect(a, b).expect("disconnect");
        network.remake().expect("remake");
        assert!(!network.has_pending());
        network.verify().expect("consistent");
    }
}

mod t3_rollback {
    use super::*;
    use nodenet_core::{GroupInit, RemovedNode};
    use std::cell::Cell;

    thread_local! {
        /// Hook that fails the next time any pool on this thread runs it.
        static ARMED: Cell<Option<Hook>> = const { Cell::new(None) };
    }

    fn arm(hook: Hook) {
        ARMED.with(|armed| armed.set(Some(hook)));
    }

    fn trip(hook: Hook) -> Result<(), HookFault> {
        ARMED.with(|armed| {
            if armed.get() == Some(hook) {
                armed.set(None);
                Err(HookFault::new("transient fault"))
            } else {
                Ok(())
            }
        })
    }

    /// Integer pool spread evenly over its members.
    #[derive(Debug, Clone, Default)]
    struct FlakyPool {
        amount: u64,
    }

    impl FlakyPool {
        fn construct(_kind: &GroupKind) -> Box<dyn GroupBehavior> {
            Box::new(Self::default())
        }
    }

    impl GroupBehavior for FlakyPool {
        fn initialize(&mut self, _init: &GroupInit<'_>) -> Result<(), HookFault> {
            trip(Hook::Initialize)
        }

        fn load_nodes(&mut self, _nodes: &[NodeId]) -> Result<(), HookFault> {
            trip(Hook::LoadNodes)
        }

        fn node_removed(&mut self, removed: &RemovedNode) -> Result<(), HookFault> {
            self.amount -= self.amount / removed.members_before as u64;
            Ok(())
        }

        fn split(&mut self, split: &mut SplitSet<'_>) -> Result<(), HookFault> {
            let total = split.total_nodes() as u64;
            let before = self.amount;
            for part in split.parts.iter_mut() {
                let share = before * part.nodes.len() as u64 / total;
                let target = part
                    .group
                    .downcast_mut::<FlakyPool>()
                    .ok_or_else(|| HookFault::new("not a pool"))?;
                target.amount += share;
                self.amount -= share;
            }
            Ok(())
        }

        fn merge(&mut self, retiring: &mut [MergedGroup<'_>]) -> Result<(), HookFault> {
            for merged in retiring.iter_mut() {
                let other = merged
                    .group
                    .downcast_mut::<FlakyPool>()
                    .ok_or_else(|| HookFault::new("not a pool"))?;
                self.amount += std::mem::take(&mut other.amount);
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn flaky_network() -> NodeNetwork {
        let registry = GroupRegistry::builder()
            .kind("pipe", "flaky", FlakyPool::construct, true)
            .build();
        NodeNetwork::new(Arc::new(registry), Default::default())
    }

    fn amount(network: &NodeNetwork, node: NodeId) -> u64 {
        let group = network.group_of(node).expect("node").expect("group");
        network.payload::<FlakyPool>(group).expect("pool").amount
    }

    fn fill(network: &mut NodeNetwork, node: NodeId, amount: u64) {
        let group = network.group_of(node).expect("node").expect("group");
        network.payload_mut::<FlakyPool>(group).expect("pool").amount = amount;
    }

    /// T3.4: A load failure after a split hands nothing over twice.
    #[test]
    fn failed_load_after_split_restores_pools() {
        let mut network = flaky_network();
        let a = add(&mut network, 1, "pipe");
        let b = add(&mut network, 2, "pipe");
        let c = add(&mut network, 3, "pipe");
        let d = add(&mut network, 4, "pipe");
        network.connect(a, b).expect("connect");
        network.connect(b, c).expect("connect");
        network.remake().expect("remake");
        fill(&mut network, a, 90);

        network.disconnect(b, c).expect("disconnect");
        network.connect(c, d).expect("connect");
        arm(Hook::LoadNodes);
        let result = network.remake();

        assert!(matches!(result, Err(NetworkError::Hook { hook: Hook::LoadNodes, .. })));
        assert_eq!(amount(&network, a), 90);
        assert_eq!(amount(&network, d), 0);
        assert!(network.same_group(a, c).expect("nodes"));

        network.remake().expect("retry");

        assert!(network.same_group(c, d).expect("nodes"));
        assert_eq!(amount(&network, a), 60);
        assert_eq!(amount(&network, d), 30);
        network.verify().expect("consistent");
    }

    /// T3.5: A departure survives a failure that precedes node_removed.
    #[test]
    fn failed_initialize_redelivers_departure() {
        let mut network = flaky_network();
        let [a, b, c] = [add(&mut network, 1, "pipe"), add(&mut network, 2, "pipe"), add(&mut network, 3, "pipe")];
        network.connect(a, b).expect("connect");
        network.connect(b, c).expect("connect");
        network.remake().expect("remake");
        fill(&mut network, b, 90);

        network.remove_node(a).expect("remove");
        let e = add(&mut network, 5, "pipe");
        arm(Hook::Initialize);
        let result = network.remake();

        assert!(matches!(result, Err(NetworkError::Hook { hook: Hook::Initialize, .. })));
        assert_eq!(amount(&network, b), 90);
        assert_eq!(network.group_of(e).expect("node"), None);

        network.remake().expect("retry");

        assert_eq!(amount(&network, b), 60);
        assert_eq!(amount(&network, e), 0);
        assert!(!network.has_pending());
    }
}
