//! # nodenet HTTP API Module
//!
//! Read-only debug server for external visualizers, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /groups` - All live groups
//! - `GET /groups/{net_id}` - One group by net id
//! - `GET /nodes` - Named nodes and their groups
//! - `GET /metrics` - Aggregate counters
//!
//! ## Configuration (Environment Variables)
//!
//! - `NODENET_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `nodenet::api::*`)
pub use handlers::{groups_handler, group_handler, health_handler, metrics_handler, nodes_handler};
pub use types::{ErrorResponse, GroupsResponse, HealthResponse, NodesResponse};

use crate::scenario::Roster;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use nodenet_core::NetworkError;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the roster of a finished run, never written again.
#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<Roster>,
}

impl AppState {
    #[must_use]
    pub fn new(roster: Roster) -> Self {
        Self {
            roster: Arc::new(roster),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `NODENET_CORS_ORIGINS`.
///
/// - `*`: any origin
/// - unset: localhost only
/// - otherwise: the comma-separated origins that parse
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("NODENET_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (NODENET_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in NODENET_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => build_localhost_cors(),
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = [
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/groups", get(handlers::groups_handler))
        .route("/groups/{net_id}", get(handlers::group_handler))
        .route("/nodes", get(handlers::nodes_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `roster` until Ctrl+C.
pub async fn run_server(addr: &str, roster: Roster) -> Result<(), NetworkError> {
    let router = create_router(AppState::new(roster));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| NetworkError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("nodenet debug server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Cannot listen for Ctrl+C: {}", e);
            }
        })
        .await
        .map_err(|e| NetworkError::Io(format!("Server error: {}", e)))
}
