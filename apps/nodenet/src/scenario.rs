//! # Scenario Runner
//!
//! A scenario is a JSON script of topology mutations grouped into ticks.
//! Each tick applies its ops in order, runs one remake pass, then applies
//! the tick's `fill` ops against the freshly remade groups.
//!
//! ```json
//! { "ticks": [
//!     { "ops": [
//!         { "op": "add", "name": "a", "entity": 1, "kind": "pipe" },
//!         { "op": "add", "name": "b", "entity": 2, "kind": "pipe" },
//!         { "op": "connect", "a": "a", "b": "b" },
//!         { "op": "fill", "name": "a", "amount": 100 }
//!     ] }
//! ] }
//! ```
//!
//! Node names are local to the scenario.

use nodenet_core::primitives::DEFAULT_KIND;
use nodenet_core::{
    EntityId, GroupSnapshot, NetId, NetworkError, NetworkMetrics, NodeId, NodeNetwork, PoolGroup,
    RemakeReport,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Maximum scenario file size (16 MB).
const MAX_SCENARIO_FILE_SIZE: u64 = 16 * 1024 * 1024;

// =============================================================================
// SCRIPT FORMAT
// =============================================================================

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

/// One scripted mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Add {
        name: String,
        entity: EntityId,
        #[serde(default = "default_kind")]
        kind: String,
    },
    Remove {
        name: String,
    },
    RemoveEntity {
        entity: EntityId,
    },
    Connect {
        a: String,
        b: String,
    },
    Disconnect {
        a: String,
        b: String,
    },
    /// Add to the pool of the node's group, after the tick's pass.
    Fill {
        name: String,
        amount: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    #[serde(default)]
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub ticks: Vec<Tick>,
}

impl Scenario {
    pub fn from_json_str(input: &str) -> Result<Self, NetworkError> {
        serde_json::from_str(input)
            .map_err(|e| NetworkError::Config(format!("Invalid scenario: {}", e)))
    }

    /// Load a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            NetworkError::Io(format!("Cannot read scenario '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_SCENARIO_FILE_SIZE {
            return Err(NetworkError::Io(format!(
                "Scenario size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SCENARIO_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            NetworkError::Io(format!("Cannot read scenario '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }
}

// =============================================================================
// ROSTER
// =============================================================================

/// A named node and where it ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub owner: EntityId,
    pub kind: String,
    pub net_id: Option<NetId>,
    pub degree: usize,
}

/// Result of a run, as printed by the CLI and served over HTTP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub tick: u64,
    pub groups: Vec<GroupSnapshot>,
    pub nodes: Vec<NodeEntry>,
    pub metrics: NetworkMetrics,
}

impl Roster {
    #[must_use]
    pub fn group(&self, net_id: NetId) -> Option<&GroupSnapshot> {
        self.groups.iter().find(|g| g.net_id == net_id)
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Drives a network through a scenario.
#[derive(Debug)]
pub struct ScenarioRunner {
    network: NodeNetwork,
    names: BTreeMap<String, NodeId>,
    verify: bool,
}

impl ScenarioRunner {
    /// Wrap a network. With `verify` set, the full consistency check runs
    /// after every tick.
    #[must_use]
    pub fn new(network: NodeNetwork, verify: bool) -> Self {
        Self {
            network,
            names: BTreeMap::new(),
            verify,
        }
    }

    #[must_use]
    pub fn network(&self) -> &NodeNetwork {
        &self.network
    }

    /// Node currently bound to `name`.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    fn resolve(&self, name: &str) -> Result<NodeId, NetworkError> {
        self.node(name)
            .ok_or_else(|| NetworkError::Config(format!("Unknown node '{}' in scenario", name)))
    }

    /// Apply one tick and run its remake pass.
    pub fn apply_tick(&mut self, tick: &Tick) -> Result<RemakeReport, NetworkError> {
        let mut fills = Vec::new();
        for op in &tick.ops {
            match op {
                Op::Add { name, entity, kind } => {
                    if self.names.contains_key(name) {
                        return Err(NetworkError::Config(format!(
                            "Node '{}' defined twice in scenario",
                            name
                        )));
                    }
                    let id = self.network.add_node(*entity, kind.as_str())?;
                    self.names.insert(name.clone(), id);
                }
                Op::Remove { name } => {
                    let id = self.resolve(name)?;
                    self.network.remove_node(id)?;
                    self.names.remove(name);
                }
                Op::RemoveEntity { entity } => {
                    self.network.remove_entity(*entity)?;
                    let network = &self.network;
                    self.names.retain(|_, id| network.contains_node(*id));
                }
                Op::Connect { a, b } => {
                    let (a, b) = (self.resolve(a)?, self.resolve(b)?);
                    self.network.connect(a, b)?;
                }
                Op::Disconnect { a, b } => {
                    let (a, b) = (self.resolve(a)?, self.resolve(b)?);
                    self.network.disconnect(a, b)?;
                }
                Op::Fill { name, amount } => fills.push((name, *amount)),
            }
        }

        let report = self.network.remake()?;

        for (name, amount) in fills {
            let id = self.resolve(name)?;
            let pool = self
                .network
                .payload_of_node_mut::<PoolGroup>(id)?
                .ok_or_else(|| {
                    NetworkError::Config(format!("Node '{}' is not in a pool group", name))
                })?;
            pool.fill(amount);
        }

        if self.verify {
            self.network.verify()?;
        }
        Ok(report)
    }

    /// Run every tick in order, stopping at the first error.
    pub fn run(&mut self, scenario: &Scenario) -> Result<Vec<RemakeReport>, NetworkError> {
        let mut reports = Vec::with_capacity(scenario.ticks.len());
        for tick in &scenario.ticks {
            let report = self.apply_tick(tick)?;
            tracing::info!(
                tick = report.tick,
                created = report.created,
                retired = report.retired,
                "tick applied"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Snapshot of the network with scenario names attached.
    #[must_use]
    pub fn roster(&self) -> Roster {
        let snapshot = self.network.snapshot();
        let nodes = self
            .names
            .iter()
            .filter_map(|(name, id)| {
                let node = self.network.node(*id)?;
                let net_id = node
                    .group()
                    .and_then(|g| self.network.group(g))
                    .map(|g| g.net_id());
                Some(NodeEntry {
                    name: name.clone(),
                    owner: node.owner(),
                    kind: node.kind().to_string(),
                    net_id,
                    degree: node.degree(),
                })
            })
            .collect();
        Roster {
            tick: snapshot.tick,
            groups: snapshot.groups,
            nodes,
            metrics: self.network.metrics(),
        }
    }
}
