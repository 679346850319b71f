//! # Engine Primitives
//!
//! Hardcoded constants for the node-grouping engine.

/// First diagnostic id handed out by a fresh network.
///
/// Zero is never assigned, so a visualizer can treat it as "no group".
pub const FIRST_NET_ID: u64 = 1;

/// Kind used by the builtin configuration for plain networks.
pub const DEFAULT_KIND: &str = "default";

/// Second kind of the builtin configuration, sharing the `base` variant.
pub const WIRE_NET_KIND: &str = "wire_net";

/// Variant name of the payload-free group.
pub const BASE_VARIANT: &str = "base";

/// Variant name of the shared integer pool group.
pub const POOL_VARIANT: &str = "pool";

/// Maximum configuration file size accepted by `NetworkConfig::load`.
///
/// A registry file is a handful of lines; anything larger is a mistake.
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Maximum length of a group kind name.
pub const MAX_KIND_LENGTH: usize = 64;
