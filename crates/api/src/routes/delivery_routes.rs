//! Delivery route endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{CreateRoute, Route};
use reactions::Fleet;
use serde::Deserialize;

use super::ListParams;
use crate::error::{ApiError, Envelope, parse_id};

#[derive(Debug, Deserialize)]
pub struct CheckpointRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DurationRequest {
    pub estimated_duration_minutes: i64,
}

/// POST /routes
#[tracing::instrument(skip(fleet))]
pub async fn create(
    State(fleet): State<Arc<Fleet>>,
    Json(req): Json<CreateRoute>,
) -> Envelope<Route> {
    fleet.routes.create(req).await.into()
}

/// GET /routes
pub async fn list(
    State(fleet): State<Arc<Fleet>>,
    Query(params): Query<ListParams>,
) -> Envelope<Vec<Route>> {
    fleet.routes.get_all_cached(params.refresh).await.into()
}

/// GET /routes/{id}
pub async fn get(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Route>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.routes.get_by_id_cached(id).await.into())
}

/// POST /routes/{id}/checkpoints
pub async fn add_checkpoint(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
    Json(req): Json<CheckpointRequest>,
) -> Result<Envelope<Route>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.routes.add_checkpoint(id, &req.name).await.into())
}

/// DELETE /routes/{id}/checkpoints/{name}
pub async fn remove_checkpoint(
    State(fleet): State<Arc<Fleet>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Envelope<Route>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.routes.remove_checkpoint(id, &name).await.into())
}

/// POST /routes/{id}/duration
pub async fn update_duration(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
    Json(req): Json<DurationRequest>,
) -> Result<Envelope<Route>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet
        .routes
        .update_estimated_duration(id, req.estimated_duration_minutes)
        .await
        .into())
}

/// DELETE /routes/{id}
pub async fn delete(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<()>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.routes.delete(id).await.into())
}
