//! Driver endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{Driver, RegisterDriver};
use reactions::Fleet;
use serde::Deserialize;

use super::ListParams;
use crate::error::{ApiError, Envelope, parse_id};

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LicenseRequest {
    pub license_level: String,
}

/// POST /drivers
#[tracing::instrument(skip(fleet))]
pub async fn register(
    State(fleet): State<Arc<Fleet>>,
    Json(req): Json<RegisterDriver>,
) -> Envelope<Driver> {
    fleet.drivers.register(req).await.into()
}

/// GET /drivers
pub async fn list(
    State(fleet): State<Arc<Fleet>>,
    Query(params): Query<ListParams>,
) -> Envelope<Vec<Driver>> {
    fleet.drivers.get_all_cached(params.refresh).await.into()
}

/// GET /drivers/{id}
pub async fn get(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Driver>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.drivers.get_by_id(id).await.into())
}

/// POST /drivers/{id}/rename
pub async fn rename(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Envelope<Driver>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.drivers.rename(id, &req.name).await.into())
}

/// POST /drivers/{id}/license
pub async fn change_license(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
    Json(req): Json<LicenseRequest>,
) -> Result<Envelope<Driver>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.drivers.change_license(id, &req.license_level).await.into())
}

/// DELETE /drivers/{id}
pub async fn delete(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<()>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.drivers.delete(id).await.into())
}
