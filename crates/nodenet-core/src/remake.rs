//! # Remake Engine
//!
//! Reconciles group membership with the graph once per tick.
//!
//! ## Pass outline
//!
//! 1. Partition the dirty set (and groups that lost members) by kind.
//! 2. Per kind, flood-fill from the dirty nodes and from every member of
//!    each touched group, lowest key first, never crossing into another kind.
//! 3. Decide an owner for every component: the touched group with the most
//!    members there (among groups whose largest piece is there), or a fresh
//!    group.
//! 4. Run the payload hooks: initialize, node_removed, split, merge,
//!    load_nodes, retire.
//! 5. Commit the new membership and drop retired groups.
//!
//! Partitions are independent. A hook failure leaves earlier partitions
//! committed and requeues the failing one and everything after it. The
//! failing partition's payloads are restored from copies taken before its
//! first hook, and its departures are queued again, so the retry sees
//! exactly the state the failed attempt started from.

use crate::group::{
    GroupBehavior, GroupInit, MergedGroup, NodeGroup, RemovedNode, SplitPart, SplitSet,
};
use crate::network::{Departure, NodeNetwork};
use crate::{GroupId, GroupKind, Hook, HookFault, NetId, NetworkError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;

// =============================================================================
// REPORT
// =============================================================================

/// What one remake pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemakeReport {
    pub tick: u64,
    /// Kind partitions processed.
    pub partitions: usize,
    /// Nodes visited by the flood fill.
    pub nodes_scanned: usize,
    pub created: usize,
    pub reused: usize,
    pub retired: usize,
    pub splits: usize,
    pub merges: usize,
    /// Members left without a group by the singleton policy.
    pub stranded: usize,
    pub elapsed_micros: u64,
}

impl RemakeReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.partitions == 0
    }
}

// =============================================================================
// PLANNING TYPES
// =============================================================================

/// Dirty nodes and touched groups of one kind.
#[derive(Debug, Default)]
struct Partition {
    seeds: BTreeSet<NodeId>,
    touched: BTreeSet<GroupId>,
}

/// Outcome of planning one partition, before any hook runs.
#[derive(Debug)]
struct Plan {
    kind: GroupKind,
    components: Vec<Vec<NodeId>>,
    /// Whether each component gets a group at all.
    grouped: Vec<bool>,
    /// Owning group of each component.
    owners: Vec<Option<GroupId>>,
    /// Touched group -> component index -> its members there.
    pieces: BTreeMap<GroupId, BTreeMap<usize, Vec<NodeId>>>,
    /// Fresh group -> component it was built for.
    fresh: BTreeMap<GroupId, usize>,
    /// Touched groups that own no component after the pass.
    retiring: Vec<GroupId>,
    departures: BTreeMap<GroupId, Vec<Departure>>,
}

impl Plan {
    fn grouped_pieces(&self, group: GroupId) -> impl Iterator<Item = (usize, &Vec<NodeId>)> {
        self.pieces
            .get(&group)
            .into_iter()
            .flat_map(|pieces| pieces.iter())
            .filter(|(index, _)| self.grouped.get(**index).copied().unwrap_or(false))
            .map(|(index, nodes)| (*index, nodes))
    }
}

/// Payloads checked out of the arena for the duration of the hooks.
type Payloads = BTreeMap<GroupId, Box<dyn GroupBehavior>>;

fn hook_error(hook: Hook, net_id: NetId) -> impl FnOnce(HookFault) -> NetworkError {
    move |source| NetworkError::Hook {
        hook,
        net_id,
        source,
    }
}

// =============================================================================
// REMAKE PASS
// =============================================================================

impl NodeNetwork {
    /// Run one remake pass over everything marked since the last one.
    ///
    /// A pass with nothing pending changes nothing and allocates no ids.
    pub fn remake(&mut self) -> Result<RemakeReport, NetworkError> {
        if self.faulted {
            return Err(NetworkError::Faulted);
        }
        let started = Instant::now();
        self.tick = self.tick.saturating_add(1);
        let mut report = RemakeReport {
            tick: self.tick,
            ..RemakeReport::default()
        };
        if !self.has_pending() {
            return Ok(report);
        }
        self.retired.clear();

        let dirty = std::mem::take(&mut self.dirty);
        let mut departures = std::mem::take(&mut self.departures);
        let partitions = match self.partition(&dirty, &departures) {
            Ok(partitions) => partitions,
            Err(err) => return Err(self.latch(err)),
        };
        report.partitions = partitions.len();

        let mut remaining = partitions.into_iter();
        while let Some((kind, partition)) = remaining.next() {
            let taken: BTreeMap<GroupId, Vec<Departure>> = partition
                .touched
                .iter()
                .filter_map(|g| departures.remove(g).map(|d| (*g, d)))
                .collect();

            if let Err(err) = self.remake_partition(kind, &partition, taken, &mut report) {
                if err.is_fatal() {
                    return Err(self.latch(err));
                }
                tracing::warn!(error = %err, "remake aborted, partition requeued");
                self.requeue(&partition);
                for (_, rest) in remaining.by_ref() {
                    self.requeue(&rest);
                    for group in &rest.touched {
                        if let Some(list) = departures.remove(group) {
                            self.departures.insert(*group, list);
                        }
                    }
                }
                return Err(err);
            }
        }

        if self.settings.verify_after_remake {
            if let Err(err) = self.verify() {
                return Err(self.latch(err));
            }
        }

        report.elapsed_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        tracing::debug!(
            tick = report.tick,
            partitions = report.partitions,
            scanned = report.nodes_scanned,
            created = report.created,
            reused = report.reused,
            retired = report.retired,
            splits = report.splits,
            merges = report.merges,
            elapsed_us = report.elapsed_micros,
            "node groups remade"
        );
        Ok(report)
    }

    fn latch(&mut self, err: NetworkError) -> NetworkError {
        if err.is_fatal() {
            tracing::error!(error = %err, "node network faulted");
            self.faulted = true;
        }
        err
    }

    fn requeue(&mut self, partition: &Partition) {
        for &node in &partition.seeds {
            if self.nodes.contains_key(node) {
                self.dirty.insert(node);
            }
        }
        for &group in &partition.touched {
            if self.groups.contains_key(group) {
                self.departures.entry(group).or_default();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Partitioning and flood fill
    // -------------------------------------------------------------------------

    fn partition(
        &self,
        dirty: &BTreeSet<NodeId>,
        departures: &BTreeMap<GroupId, Vec<Departure>>,
    ) -> Result<BTreeMap<GroupKind, Partition>, NetworkError> {
        let mut partitions: BTreeMap<GroupKind, Partition> = BTreeMap::new();
        for &id in dirty {
            let node = self.nodes.get(id).ok_or_else(|| {
                NetworkError::Inconsistent(format!("dirty set holds destroyed node {:?}", id))
            })?;
            let partition = partitions.entry(node.kind().clone()).or_default();
            partition.seeds.insert(id);
            if let Some(group) = node.group() {
                partition.touched.insert(group);
            }
        }
        for &group in departures.keys() {
            let record = self.groups.get(group).ok_or_else(|| {
                NetworkError::Inconsistent(format!("departure for missing group {:?}", group))
            })?;
            partitions
                .entry(record.kind().clone())
                .or_default()
                .touched
                .insert(group);
        }
        Ok(partitions)
    }

    /// The group a node points at, checked against the partition kind.
    fn checked_group(&self, node: NodeId, kind: &GroupKind) -> Result<Option<GroupId>, NetworkError> {
        let Some(group) = self.nodes.get(node).and_then(|n| n.group()) else {
            return Ok(None);
        };
        let record = self.groups.get(group).ok_or_else(|| {
            NetworkError::Inconsistent(format!("node {:?} points at retired group {:?}", node, group))
        })?;
        if record.kind() != kind {
            return Err(NetworkError::Inconsistent(format!(
                "node {:?} of kind {} sits in {} group {}",
                node,
                kind,
                record.kind(),
                record.net_id()
            )));
        }
        Ok(Some(group))
    }

    /// Live members of `group` that still point back at it.
    fn live_members(&self, group: GroupId) -> impl Iterator<Item = NodeId> + '_ {
        self.groups
            .get(group)
            .into_iter()
            .flat_map(|record| record.nodes().iter().copied())
            .filter(move |n| self.nodes.get(*n).is_some_and(|node| node.group() == Some(group)))
    }

    /// Flood-fill every component reachable from the partition.
    fn scan(
        &self,
        kind: &GroupKind,
        partition: &Partition,
    ) -> Result<(Vec<Vec<NodeId>>, BTreeSet<GroupId>), NetworkError> {
        let mut touched = partition.touched.clone();
        let mut pending: BTreeSet<NodeId> = partition
            .seeds
            .iter()
            .copied()
            .filter(|n| self.nodes.contains_key(*n))
            .collect();
        for &group in &touched {
            pending.extend(self.live_members(group));
        }

        let mut assigned: BTreeSet<NodeId> = BTreeSet::new();
        let mut components = Vec::new();
        while let Some(seed) = pending.pop_first() {
            if !assigned.insert(seed) {
                continue;
            }
            let mut members = Vec::new();
            let mut queue = VecDeque::from([seed]);
            while let Some(current) = queue.pop_front() {
                let node = self.nodes.get(current).ok_or_else(|| {
                    NetworkError::Inconsistent(format!("edge to destroyed node {:?}", current))
                })?;
                members.push(current);

                if let Some(group) = self.checked_group(current, kind)? {
                    if touched.insert(group) {
                        pending.extend(self.live_members(group));
                    }
                }

                for neighbor in node.neighbors() {
                    let same_kind = self
                        .nodes
                        .get(neighbor)
                        .ok_or_else(|| {
                            NetworkError::Inconsistent(format!(
                                "node {:?} lists destroyed neighbor {:?}",
                                current, neighbor
                            ))
                        })?
                        .kind()
                        == kind;
                    if same_kind && assigned.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            components.push(members);
        }
        Ok((components, touched))
    }

    // -------------------------------------------------------------------------
    // Planning
    // -------------------------------------------------------------------------

    fn plan(
        &self,
        kind: GroupKind,
        components: Vec<Vec<NodeId>>,
        touched: &BTreeSet<GroupId>,
        departures: BTreeMap<GroupId, Vec<Departure>>,
    ) -> Plan {
        let singletons = self.registry.singleton_groups(&kind);
        let grouped: Vec<bool> = components
            .iter()
            .map(|members| singletons || members.len() > 1)
            .collect();

        let mut pieces: BTreeMap<GroupId, BTreeMap<usize, Vec<NodeId>>> =
            touched.iter().map(|g| (*g, BTreeMap::new())).collect();
        for (index, members) in components.iter().enumerate() {
            for &id in members {
                if let Some(group) = self.nodes.get(id).and_then(|n| n.group()) {
                    pieces
                        .entry(group)
                        .or_default()
                        .entry(index)
                        .or_default()
                        .push(id);
                }
            }
        }

        // Home of a group: the grouped component holding most of its members.
        let mut candidates: BTreeMap<usize, Vec<GroupId>> = BTreeMap::new();
        for (&group, by_component) in &pieces {
            let mut home: Option<(usize, usize)> = None;
            for (&index, members) in by_component {
                if !grouped[index] {
                    continue;
                }
                if home.is_none_or(|(_, best)| members.len() > best) {
                    home = Some((index, members.len()));
                }
            }
            if let Some((index, _)) = home {
                candidates.entry(index).or_default().push(group);
            }
        }

        let mut owners = vec![None; components.len()];
        for (index, groups) in candidates {
            let survivor = groups.into_iter().max_by(|a, b| {
                let size = |g: &GroupId| pieces.get(g).and_then(|p| p.get(&index)).map_or(0, Vec::len);
                let net = |g: &GroupId| self.groups.get(*g).map_or(NetId::default(), NodeGroup::net_id);
                size(a).cmp(&size(b)).then_with(|| net(b).cmp(&net(a)))
            });
            owners[index] = survivor;
        }

        let retiring = touched
            .iter()
            .copied()
            .filter(|g| !owners.contains(&Some(*g)))
            .collect();

        Plan {
            kind,
            components,
            grouped,
            owners,
            pieces,
            fresh: BTreeMap::new(),
            retiring,
            departures,
        }
    }

    // -------------------------------------------------------------------------
    // One partition
    // -------------------------------------------------------------------------

    fn remake_partition(
        &mut self,
        kind: GroupKind,
        partition: &Partition,
        departures: BTreeMap<GroupId, Vec<Departure>>,
        report: &mut RemakeReport,
    ) -> Result<(), NetworkError> {
        let (components, touched) = self.scan(&kind, partition)?;
        report.nodes_scanned += components.iter().map(Vec::len).sum::<usize>();
        let mut plan = self.plan(kind, components, &touched, departures);

        let outcome = self
            .build_fresh(&mut plan)
            .and_then(|()| self.dispatch(&plan, &touched));

        match outcome {
            Ok(counts) => {
                report.splits += counts.splits;
                report.merges += counts.merges;
                report.stranded += counts.stranded;
                report.created += plan.fresh.len();
                report.reused += plan
                    .owners
                    .iter()
                    .flatten()
                    .filter(|g| !plan.fresh.contains_key(g))
                    .count();
                report.retired += plan.retiring.len();
                self.commit(plan);
                Ok(())
            }
            Err(err) => {
                for group in plan.fresh.keys() {
                    self.groups.remove(*group);
                }
                // Payloads were rolled back, so every departure is owed again.
                for (group, list) in plan.departures {
                    if self.groups.contains_key(group) {
                        self.departures.entry(group).or_default().extend(list);
                    }
                }
                Err(err)
            }
        }
    }

    /// Insert a fresh record for every grouped component without an owner.
    /// Records go into the arena up front so split targets have keys.
    fn build_fresh(&mut self, plan: &mut Plan) -> Result<(), NetworkError> {
        for index in 0..plan.components.len() {
            if plan.grouped[index] && plan.owners[index].is_none() {
                let behavior = self.registry.construct(&plan.kind)?;
                let net_id = self.alloc_net_id();
                let group = self
                    .groups
                    .insert(NodeGroup::new(plan.kind.clone(), net_id, behavior));
                plan.owners[index] = Some(group);
                plan.fresh.insert(group, index);
            }
        }
        Ok(())
    }

    /// Check payloads out, run the hooks and check them back in. If a hook
    /// fails, every payload that existed before the pass is restored.
    fn dispatch(
        &mut self,
        plan: &Plan,
        touched: &BTreeSet<GroupId>,
    ) -> Result<HookCounts, NetworkError> {
        let mut payloads: Payloads = BTreeMap::new();
        for &group in touched.iter().chain(plan.fresh.keys()) {
            if let Some(record) = self.groups.get_mut(group) {
                record.set_remaking(true);
                payloads.insert(group, record.detach_behavior());
            }
        }
        let checkpoint: Payloads = payloads
            .iter()
            .filter(|(group, _)| !plan.fresh.contains_key(*group))
            .map(|(group, payload)| (*group, (**payload).clone_behavior()))
            .collect();

        let outcome = self.run_hooks(plan, &mut payloads);
        if outcome.is_err() {
            payloads.extend(checkpoint);
        }

        for (group, payload) in payloads {
            if let Some(record) = self.groups.get_mut(group) {
                record.attach_behavior(payload);
                record.set_remaking(false);
            }
        }
        outcome
    }

    fn net_id(&self, group: GroupId) -> Result<NetId, NetworkError> {
        self.groups
            .get(group)
            .map(NodeGroup::net_id)
            .ok_or(NetworkError::GroupNotFound(group))
    }

    fn run_hooks(&self, plan: &Plan, payloads: &mut Payloads) -> Result<HookCounts, NetworkError> {
        let mut counts = HookCounts::default();

        // Fresh groups: initialize, then load their whole component.
        for (&group, &index) in &plan.fresh {
            let net_id = self.net_id(group)?;
            let members = &plan.components[index];
            let payload = checked_out(payloads, group)?;
            let source = members.first().copied().ok_or_else(|| {
                NetworkError::Inconsistent(format!("fresh group {} has no members", net_id))
            })?;
            let source_owner = self
                .nodes
                .get(source)
                .map(|n| n.owner())
                .ok_or(NetworkError::NodeNotFound(source))?;
            let init = GroupInit {
                net_id,
                kind: &plan.kind,
                source,
                source_owner,
                node_count: members.len(),
            };
            payload
                .initialize(&init)
                .map_err(hook_error(Hook::Initialize, net_id))?;
            payload
                .load_nodes(members)
                .map_err(hook_error(Hook::LoadNodes, net_id))?;
            tracing::trace!(%net_id, nodes = members.len(), "group created");
        }

        // Destroyed members first, then members stranded without a group.
        for (&group, by_component) in &plan.pieces {
            let net_id = self.net_id(group)?;
            let departed = plan.departures.get(&group).map_or(&[][..], Vec::as_slice);
            let stranded: Vec<NodeId> = by_component
                .iter()
                .filter(|(index, _)| !plan.grouped[**index])
                .flat_map(|(_, nodes)| nodes.iter().copied())
                .collect();
            if departed.is_empty() && stranded.is_empty() {
                continue;
            }

            let live: usize = by_component.values().map(Vec::len).sum();
            let mut members_before = live + departed.len();
            let payload = checked_out(payloads, group)?;
            let leaving = departed.iter().map(|d| (d.node, d.owner)).chain(
                stranded
                    .iter()
                    .filter_map(|&n| self.nodes.get(n).map(|node| (n, node.owner()))),
            );
            for (node, owner) in leaving {
                payload
                    .node_removed(&RemovedNode {
                        node,
                        owner,
                        members_before,
                    })
                    .map_err(hook_error(Hook::NodeRemoved, net_id))?;
                members_before = members_before.saturating_sub(1);
            }
            counts.stranded += stranded.len();
        }

        // Splits: one call per group whose members now sit in several groups.
        for &group in plan.pieces.keys() {
            if plan.grouped_pieces(group).count() < 2 {
                continue;
            }
            let mut own = payloads.remove(&group).ok_or_else(|| {
                NetworkError::Inconsistent(format!("split source {:?} not checked out", group))
            })?;
            let result = self.split_group(plan, group, own.as_mut(), payloads);
            payloads.insert(group, own);
            result?;
            counts.splits += 1;
        }

        // Merges: each reused owner absorbs retiring groups wholly inside it.
        for (index, owner) in plan.owners.iter().enumerate() {
            let Some(survivor) = *owner else { continue };
            if plan.fresh.contains_key(&survivor) {
                continue;
            }
            let absorbed: Vec<GroupId> = plan
                .retiring
                .iter()
                .copied()
                .filter(|g| {
                    let mut pieces = plan.grouped_pieces(*g);
                    matches!((pieces.next(), pieces.next()), (Some((i, _)), None) if i == index)
                })
                .collect();
            if absorbed.is_empty() {
                continue;
            }
            let mut own = payloads.remove(&survivor).ok_or_else(|| {
                NetworkError::Inconsistent(format!("merge survivor {:?} not checked out", survivor))
            })?;
            let result = self.merge_groups(plan, survivor, index, &absorbed, own.as_mut(), payloads);
            payloads.insert(survivor, own);
            result?;
            counts.merges += 1;
        }

        // Reused owners learn about nodes that joined them.
        for (index, owner) in plan.owners.iter().enumerate() {
            let Some(survivor) = *owner else { continue };
            if plan.fresh.contains_key(&survivor) {
                continue;
            }
            let joined: Vec<NodeId> = plan.components[index]
                .iter()
                .copied()
                .filter(|n| self.nodes.get(*n).and_then(|node| node.group()) != Some(survivor))
                .collect();
            if joined.is_empty() {
                continue;
            }
            let net_id = self.net_id(survivor)?;
            checked_out(payloads, survivor)?
                .load_nodes(&joined)
                .map_err(hook_error(Hook::LoadNodes, net_id))?;
        }

        for &group in &plan.retiring {
            let net_id = self.net_id(group)?;
            checked_out(payloads, group)?
                .retire()
                .map_err(hook_error(Hook::Retire, net_id))?;
        }

        Ok(counts)
    }

    fn split_group(
        &self,
        plan: &Plan,
        group: GroupId,
        own: &mut dyn GroupBehavior,
        payloads: &mut Payloads,
    ) -> Result<(), NetworkError> {
        let net_id = self.net_id(group)?;
        let mut handles: BTreeMap<GroupId, &mut Box<dyn GroupBehavior>> =
            payloads.iter_mut().map(|(g, payload)| (*g, payload)).collect();

        let mut kept: &[NodeId] = &[];
        let mut parts = Vec::new();
        for (index, nodes) in plan.grouped_pieces(group) {
            let target = plan.owners[index].ok_or_else(|| {
                NetworkError::Inconsistent(format!("grouped component {} has no owner", index))
            })?;
            if target == group {
                kept = nodes.as_slice();
                continue;
            }
            let handle = handles.remove(&target).ok_or_else(|| {
                NetworkError::Inconsistent(format!("split target {:?} not checked out", target))
            })?;
            parts.push(SplitPart {
                net_id: self.net_id(target)?,
                nodes: nodes.as_slice(),
                fresh: plan.fresh.contains_key(&target),
                group: &mut **handle,
            });
        }

        tracing::trace!(%net_id, kept = kept.len(), parts = parts.len(), "group split");
        let mut split = SplitSet { kept, parts };
        own.split(&mut split).map_err(hook_error(Hook::Split, net_id))
    }

    fn merge_groups(
        &self,
        plan: &Plan,
        survivor: GroupId,
        index: usize,
        absorbed: &[GroupId],
        own: &mut dyn GroupBehavior,
        payloads: &mut Payloads,
    ) -> Result<(), NetworkError> {
        let net_id = self.net_id(survivor)?;
        let mut handles: BTreeMap<GroupId, &mut Box<dyn GroupBehavior>> =
            payloads.iter_mut().map(|(g, payload)| (*g, payload)).collect();

        let mut merged = Vec::with_capacity(absorbed.len());
        for &group in absorbed {
            let nodes = plan
                .pieces
                .get(&group)
                .and_then(|p| p.get(&index))
                .map_or(&[][..], Vec::as_slice);
            let handle = handles.remove(&group).ok_or_else(|| {
                NetworkError::Inconsistent(format!("merged group {:?} not checked out", group))
            })?;
            merged.push(MergedGroup {
                net_id: self.net_id(group)?,
                nodes,
                group: &mut **handle,
            });
        }

        tracing::trace!(%net_id, absorbed = merged.len(), "groups merged");
        own.merge(&mut merged).map_err(hook_error(Hook::Merge, net_id))
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    fn commit(&mut self, plan: Plan) {
        for (members, owner) in plan.components.into_iter().zip(plan.owners) {
            for &id in &members {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.set_group(owner);
                }
            }
            if let Some(group) = owner.and_then(|g| self.groups.get_mut(g)) {
                group.set_nodes(members);
            }
        }

        for group in plan.retiring {
            if let Some(mut record) = self.groups.remove(group) {
                record.mark_removed();
                tracing::trace!(net_id = %record.net_id(), "group retired");
                self.retired.push(record);
            }
        }
    }
}

/// Hook tallies of one partition.
#[derive(Debug, Default)]
struct HookCounts {
    splits: usize,
    merges: usize,
    stranded: usize,
}

fn checked_out(
    payloads: &mut Payloads,
    group: GroupId,
) -> Result<&mut dyn GroupBehavior, NetworkError> {
    match payloads.get_mut(&group) {
        Some(payload) => Ok(payload.as_mut()),
        None => Err(NetworkError::Inconsistent(format!(
            "payload of {:?} not checked out",
            group
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================
