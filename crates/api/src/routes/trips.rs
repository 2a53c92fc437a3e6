//! Trip endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{CancelTrip, RecordTripEvent, ResponseStatus, ServiceResponse, StartTrip, Trip};
use projections::TripProgress;
use reactions::Fleet;
use serde::Deserialize;

use crate::error::{ApiError, Envelope, parse_id};

#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

/// POST /trips
#[tracing::instrument(skip(fleet))]
pub async fn start(State(fleet): State<Arc<Fleet>>, Json(req): Json<StartTrip>) -> Envelope<Trip> {
    fleet.trips.start_trip(req).await.into()
}

/// GET /trips
pub async fn list(State(fleet): State<Arc<Fleet>>) -> Envelope<Vec<Trip>> {
    fleet.trips.get_all().await.into()
}

/// GET /trips/{id}
pub async fn get(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Trip>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.trips.get_by_id_cached(id).await.into())
}

/// POST /trips/{id}/events
#[tracing::instrument(skip(fleet))]
pub async fn record_event(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
    Json(req): Json<RecordEventRequest>,
) -> Result<Envelope<Trip>, ApiError> {
    let trip_id = parse_id(&id)?;
    let cmd = RecordTripEvent {
        trip_id,
        event_type: req.event_type,
        details: req.details,
    };
    Ok(fleet.trips.record_event(cmd).await.into())
}

/// POST /trips/{id}/complete
pub async fn complete(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<Trip>, ApiError> {
    let id = parse_id(&id)?;
    Ok(fleet.trips.complete_trip(id).await.into())
}

/// POST /trips/{id}/cancel
pub async fn cancel(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Envelope<Trip>, ApiError> {
    let trip_id = parse_id(&id)?;
    let cmd = CancelTrip {
        trip_id,
        reason: req.reason,
    };
    Ok(fleet.trips.cancel_trip(cmd).await.into())
}

/// GET /trips/{id}/progress: only trips still on the road have progress.
pub async fn progress(
    State(fleet): State<Arc<Fleet>>,
    Path(id): Path<String>,
) -> Result<Envelope<TripProgress>, ApiError> {
    let id = parse_id(&id)?;
    let response = match fleet.progress.get(id).await {
        Some(progress) => ServiceResponse::ok(progress),
        None => ServiceResponse::failure(
            ResponseStatus::NotFound,
            format!("No active trip with id {id}."),
        ),
    };
    Ok(response.into())
}
