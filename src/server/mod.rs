//! Minimal operator-facing HTTP surface.
//!
//! Exposes process liveness and relay counters; it is a collaborator of the
//! relay core, not part of it. Routes:
//!
//! - `GET /` - status snapshot
//! - `GET /health` - status snapshot (liveness probe target)

mod health;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::stats::RelayStats;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    stats: Arc<RelayStats>,
}

impl AppState {
    pub fn new(stats: Arc<RelayStats>) -> Self {
        AppState { stats }
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }
}

/// Builds the router with all operator routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::status_handler))
        .route("/health", get(health::status_handler))
        .with_state(state)
}
