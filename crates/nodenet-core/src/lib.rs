//! # nodenet-core
//!
//! Deterministic node-grouping engine.
//!
//! Entities expose nodes; nodes of the same kind that are connected by edges
//! form a group, and each group carries a domain payload (a power network,
//! a shared fluid pool). The engine keeps group membership consistent with
//! the graph while payloads are split, merged and retired through hooks.
//!
//! ## Tick Model
//!
//! - Mutations (`add_node`, `connect`, ...) only mark nodes dirty
//! - `remake` reconciles all marks once per tick
//! - Membership read between the two reflects the previous pass
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded; no async, no network dependencies
//! - Iteration order is fixed by key order, so identical mutation
//!   sequences produce identical groups and net ids
//! - The group registry is read-only after startup

// =============================================================================
// MODULES
// =============================================================================

pub mod builtin;
pub mod config;
pub mod debug;
pub mod group;
pub mod mutation;
pub mod network;
pub mod node;
pub mod primitives;
pub mod registry;
pub mod remake;
pub mod types;
pub mod verify;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EntityId, GroupId, GroupKind, Hook, HookFault, NetId, NetworkError, NodeId};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use builtin::{BaseGroup, PoolGroup};
pub use config::{EngineSettings, KindConfig, NetworkConfig};
pub use debug::{GroupSnapshot, NetworkMetrics, NetworkSnapshot, NodeSnapshot};
pub use group::{BehaviorClone, GroupBehavior, GroupInit, MergedGroup, NodeGroup, RemovedNode, SplitPart, SplitSet};
pub use network::NodeNetwork;
pub use node::Node;
pub use registry::{GroupConstructor, GroupRegistry, RegistryBuilder, VariantTable};
pub use remake::RemakeReport;
