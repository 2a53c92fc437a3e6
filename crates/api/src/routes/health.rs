//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use projections::ReadModel;
use reactions::Fleet;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_trips: usize,
    pub cached_entries: usize,
}

/// GET /health: liveness plus the size of the read side.
pub async fn check(State(fleet): State<Arc<Fleet>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_trips: fleet.progress.count(),
        cached_entries: fleet.cache.count(),
    })
}
