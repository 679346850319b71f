//! # Property-Based Tests
//!
//! Random mutation sequences checked against the structural invariants:
//! groups match connected components, passes are idempotent, identical
//! inputs give identical results, and pools conserve their contents.

use nodenet_core::{
    EntityId, KindConfig, NetworkConfig, NodeId, NodeNetwork, PoolGroup, VariantTable,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Op {
    Add { owner: u64, kind: usize },
    Connect(usize, usize),
    Disconnect(usize, usize),
    Remove(usize),
    Remake,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..8, 0usize..2).prop_map(|(owner, kind)| Op::Add { owner, kind }),
        4 => (0usize..64, 0usize..64).prop_map(|(a, b)| Op::Connect(a, b)),
        1 => (0usize..64, 0usize..64).prop_map(|(a, b)| Op::Disconnect(a, b)),
        1 => (0usize..64).prop_map(Op::Remove),
        1 => Just(Op::Remake),
    ]
}

fn network(singletons: bool) -> NodeNetwork {
    let config = NetworkConfig {
        kinds: vec![
            KindConfig::new("pipe", "pool").with_singletons(singletons),
            KindConfig::new("wire", "base").with_singletons(singletons),
        ],
        ..NetworkConfig::default()
    };
    NodeNetwork::from_config(&config, &VariantTable::builtin()).expect("network")
}

fn pick(ids: &[NodeId], i: usize) -> Option<NodeId> {
    ids.get(i % ids.len().max(1)).copied()
}

/// Apply `ops`, ignoring rejected mutations. Returns every node ever added.
fn apply(network: &mut NodeNetwork, ops: &[Op]) -> Vec<NodeId> {
    const KINDS: [&str; 2] = ["pipe", "wire"];
    let mut ids = Vec::new();
    for op in ops {
        match op {
            Op::Add { owner, kind } => {
                ids.push(network.add_node(EntityId(*owner), KINDS[*kind]).expect("add"));
            }
            Op::Connect(a, b) => {
                if let (Some(a), Some(b)) = (pick(&ids, *a), pick(&ids, *b)) {
                    let _ = network.connect(a, b);
                }
            }
            Op::Disconnect(a, b) => {
                if let (Some(a), Some(b)) = (pick(&ids, *a), pick(&ids, *b)) {
                    let _ = network.disconnect(a, b);
                }
            }
            Op::Remove(a) => {
                if let Some(a) = pick(&ids, *a) {
                    let _ = network.remove_node(a);
                }
            }
            Op::Remake => {
                network.remake().expect("remake");
            }
        }
    }
    ids
}

fn membership(network: &NodeNetwork) -> Vec<(u64, Option<u64>)> {
    network
        .nodes()
        .map(|(id, node)| {
            let net = network
                .group_of(id)
                .expect("node")
                .and_then(|g| network.group(g))
                .map(|g| g.net_id().value());
            (node.owner().0, net)
        })
        .collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// After a pass, groups are exactly the same-kind components.
    #[test]
    fn groups_match_components(ops in vec(op(), 1..80), singletons in any::<bool>()) {
        let mut network = network(singletons);
        apply(&mut network, &ops);
        network.remake().expect("remake");

        prop_assert!(!network.has_pending());
        prop_assert!(network.verify().is_ok());
    }

    /// A second pass with no mutations changes nothing.
    #[test]
    fn remake_is_idempotent(ops in vec(op(), 1..80)) {
        let mut network = network(true);
        apply(&mut network, &ops);
        network.remake().expect("remake");
        let before = membership(&network);

        let live: Vec<NodeId> = network.nodes().map(|(id, _)| id).collect();
        for id in live {
            network.mark_dirty(id).expect("mark");
        }
        let report = network.remake().expect("remake");

        prop_assert_eq!(report.created, 0);
        prop_assert_eq!(report.retired, 0);
        prop_assert_eq!(membership(&network), before);
    }

    /// Same mutation sequence produces identical groups and net ids.
    #[test]
    fn determinism_identical_input_produces_identical_output(ops in vec(op(), 1..80)) {
        let mut first = network(true);
        let mut second = network(true);
        apply(&mut first, &ops);
        apply(&mut second, &ops);
        first.remake().expect("remake");
        second.remake().expect("remake");

        prop_assert_eq!(membership(&first), membership(&second));
        prop_assert_eq!(first.snapshot(), second.snapshot());
    }

    /// Batching passes differently yields the same partition.
    #[test]
    fn partition_independent_of_pass_batching(ops in vec(op(), 1..80)) {
        let batched: Vec<Op> = ops.iter().filter(|o| !matches!(o, Op::Remake)).cloned().collect();

        let mut stepwise = network(true);
        let ids_a = apply(&mut stepwise, &ops);
        stepwise.remake().expect("remake");

        let mut once = network(true);
        let ids_b = apply(&mut once, &batched);
        once.remake().expect("remake");

        let partition = |network: &NodeNetwork, ids: &[NodeId]| {
            let live: Vec<NodeId> = ids.iter().copied().filter(|n| network.contains_node(*n)).collect();
            let mut pairs = BTreeSet::new();
            for (i, a) in live.iter().enumerate() {
                for (j, b) in live.iter().enumerate().skip(i + 1) {
                    if network.same_group(*a, *b).expect("nodes") {
                        pairs.insert((i, j));
                    }
                }
            }
            pairs
        };
        prop_assert_eq!(partition(&stepwise, &ids_a), partition(&once, &ids_b));
    }

    /// Edge mutations applied in reverse order give the same partition.
    #[test]
    fn order_independence(
        kinds in vec(0usize..2, 2..24),
        edges in vec((0usize..24, 0usize..24), 0..48),
    ) {
        let build = |reversed: bool| {
            let mut network = network(true);
            let ids: Vec<NodeId> = kinds
                .iter()
                .enumerate()
                .map(|(i, k)| {
                    network
                        .add_node(EntityId(i as u64), ["pipe", "wire"][*k])
                        .expect("add")
                })
                .collect();
            let mut order: Vec<&(usize, usize)> = edges.iter().collect();
            if reversed {
                order.reverse();
            }
            for (a, b) in order {
                let _ = network.connect(ids[a % ids.len()], ids[b % ids.len()]);
            }
            network.remake().expect("remake");
            let mut pairs = BTreeSet::new();
            for i in 0..ids.len() {
                for j in i + 1..ids.len() {
                    if network.same_group(ids[i], ids[j]).expect("nodes") {
                        pairs.insert((i, j));
                    }
                }
            }
            pairs
        };
        prop_assert_eq!(build(false), build(true));
    }

    /// Splits and merges never create or destroy pool contents.
    #[test]
    fn pool_conserved_without_destruction(
        ops in vec(op(), 1..60),
        fills in vec(0u64..1000, 1..8),
    ) {
        let topology: Vec<Op> = ops.into_iter().filter(|o| !matches!(o, Op::Remove(_))).collect();
        let mut network = network(true);
        let ids = apply(&mut network, &topology);
        network.remake().expect("remake");

        let mut total = 0u64;
        for (i, amount) in fills.iter().enumerate() {
            let Some(node) = ids.get(i) else { break };
            if let Some(pool) = network.payload_of_node_mut::<PoolGroup>(*node).expect("node") {
                pool.fill(*amount);
                total += amount;
            }
        }

        let rewired: Vec<Op> = (0..ids.len())
            .flat_map(|i| [Op::Disconnect(i, i + 1), Op::Connect(i, i + 2)])
            .collect();
        apply_to(&mut network, &ids, &rewired);
        network.remake().expect("remake");

        let pooled: u64 = network
            .groups()
            .filter_map(|(id, _)| network.payload::<PoolGroup>(id))
            .map(PoolGroup::amount)
            .sum();
        prop_assert_eq!(pooled, total);
    }
}

/// Edge ops against an existing id list.
fn apply_to(network: &mut NodeNetwork, ids: &[NodeId], ops: &[Op]) {
    if ids.is_empty() {
        return;
    }
    for op in ops {
        match op {
            Op::Connect(a, b) => {
                let _ = network.connect(ids[a % ids.len()], ids[b % ids.len()]);
            }
            Op::Disconnect(a, b) => {
                let _ = network.disconnect(ids[a % ids.len()], ids[b % ids.len()]);
            }
            _ => {}
        }
    }
}
