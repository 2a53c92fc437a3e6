//! Vehicle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{RegisterVehicle, Vehicle};
use reactions::Fleet;

use super::ListParams;
use crate::error::{ApiError, Envelope, parse_id};

/// POST /vehicles
#[tracing::instrument(skip(fleet))]
pub async fn register(
    State(fleet): State<Arc<Fleet>>,
    Json(req): Json<RegisterVehicle>,
) -> Envelope<Vehicle> {
    fleet.vehicles.register(req).await.into()
}

/// GET /vehicles
pub async fn list(
    State(fleet): State<Arc<Fleet>>,
    Query(params): Query<ListParams>,
) -> Envelope<Vec<Vehicle>> {
    fleet.vehicles.get_all_cached(params.refresh).await.into()
}

/// GET /vehicles/{id}
pub async fn get(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Vehicle>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.vehicles.get_by_id(id).await.into())
}

/// POST /vehicles/{id}/damage
pub async fn mark_damaged(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Vehicle>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.vehicles.mark_damaged(id).await.into())
}

/// POST /vehicles/{id}/repair
pub async fn repair(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Vehicle>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.vehicles.repair(id).await.into())
}

/// DELETE /vehicles/{id}
pub async fn delete(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<()>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.vehicles.delete(id).await.into())
}
