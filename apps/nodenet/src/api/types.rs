//! # API Response Types
//!
//! JSON structures served by the debug server.

use crate::scenario::NodeEntry;
use nodenet_core::GroupSnapshot;
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ROSTER RESPONSES
// =============================================================================

/// Every live group after the last pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsResponse {
    pub tick: u64,
    pub count: usize,
    pub groups: Vec<GroupSnapshot>,
}

/// Every named node and its group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesResponse {
    pub count: usize,
    pub nodes: Vec<NodeEntry>,
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
