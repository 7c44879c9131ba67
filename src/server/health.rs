//! Status snapshot handler for liveness probes and operators.

use axum::Json;
use axum::extract::State;

use crate::stats::StatsSnapshot;

use super::AppState;

/// Returns the current process status snapshot.
///
/// Always 200 while the process is alive; a relay with a broken store
/// connection still answers (the `connection` field carries that state).
pub async fn status_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats().snapshot())
}
