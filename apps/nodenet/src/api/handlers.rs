//! # API Endpoint Handlers
//!
//! All handlers are read-only views of the roster.

use super::{
    AppState,
    types::{ErrorResponse, GroupsResponse, HealthResponse, NodesResponse},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nodenet_core::NetId;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// GROUP HANDLERS
// =============================================================================

/// List live groups in net-id order.
pub async fn groups_handler(State(state): State<AppState>) -> impl IntoResponse {
    let roster = &state.roster;
    let response = GroupsResponse {
        tick: roster.tick,
        count: roster.groups.len(),
        groups: roster.groups.clone(),
    };
    (StatusCode::OK, Json(response))
}

/// Look up one group by net id.
pub async fn group_handler(
    State(state): State<AppState>,
    Path(net_id): Path<u64>,
) -> Response {
    let roster = &state.roster;
    match roster.group(NetId(net_id)) {
        Some(group) => (StatusCode::OK, Json(group.clone())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("No live group {}", NetId(net_id)))),
        )
            .into_response(),
    }
}

// =============================================================================
// NODE & METRICS HANDLERS
// =============================================================================

/// List named nodes with their group.
pub async fn nodes_handler(State(state): State<AppState>) -> impl IntoResponse {
    let roster = &state.roster;
    let response = NodesResponse {
        count: roster.nodes.len(),
        nodes: roster.nodes.clone(),
    };
    (StatusCode::OK, Json(response))
}

/// Aggregate network counters.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let roster = &state.roster;
    (StatusCode::OK, Json(roster.metrics.clone()))
}
