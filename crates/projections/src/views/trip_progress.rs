//! Trip progress read model: active trips, their last checkpoint and ETA.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::AggregateId;
use domain::{FleetEvent, Route};
use entity_store::EntityStore;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// Progress of one active trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripProgress {
    pub trip_id: AggregateId,
    pub driver_id: AggregateId,
    pub vehicle_id: AggregateId,
    pub route_id: AggregateId,
    pub started_at: DateTime<Utc>,
    pub last_checkpoint: Option<String>,
    pub checkpoints_reached: usize,
    pub incidents: usize,
    pub eta: DateTime<Utc>,
}

/// Read model of trips that are in progress.
///
/// A trip enters the view when it starts, with an ETA of its start time plus
/// the route's estimated duration. Each checkpoint that is on the route moves
/// the ETA to the checkpoint time plus the share of the duration left after
/// it. Completed and cancelled trips leave the view.
#[derive(Clone)]
pub struct TripProgressView {
    routes: Arc<dyn EntityStore<Route>>,
    trips: Arc<RwLock<HashMap<AggregateId, TripProgress>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl TripProgressView {
    pub fn new(routes: Arc<dyn EntityStore<Route>>) -> Self {
        Self {
            routes,
            trips: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    pub async fn get(&self, trip_id: AggregateId) -> Option<TripProgress> {
        self.trips.read().await.get(&trip_id).cloned()
    }

    /// All active trips, earliest started first.
    pub async fn active(&self) -> Vec<TripProgress> {
        let mut trips: Vec<_> = self.trips.read().await.values().cloned().collect();
        trips.sort_by_key(|t| t.started_at);
        trips
    }

    async fn route(&self, route_id: AggregateId, trip_id: AggregateId) -> Result<Option<Route>> {
        let route = self.routes.get_by_id(route_id).await?;
        if route.is_none() {
            tracing::warn!(%route_id, %trip_id, "route not found for trip progress");
        }
        Ok(route)
    }

    async fn advance(&self, event: &FleetEvent) {
        self.position.write().await.record(event);
    }
}

/// Remaining travel time after reaching checkpoint `index` of `total`:
/// `duration * (total - 1 - index) / max(1, total)`.
pub fn remaining_after(duration: Duration, index: usize, total: usize) -> Duration {
    let remaining = total.saturating_sub(index + 1);
    duration.mul_f64(remaining as f64 / total.max(1) as f64)
}

/// `at + duration`, failing instead of overflowing the calendar.
fn eta_after(at: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(|| {
            ProjectionError::Projection(format!("ETA of {at} plus {duration:?} is out of range"))
        })
}

#[async_trait]
impl Projection for TripProgressView {
    fn name(&self) -> &'static str {
        "TripProgressView"
    }

    async fn handle(&self, event: &FleetEvent) -> Result<()> {
        self.advance(event).await;

        match event {
            FleetEvent::TripStarted(e) => {
                let Some(route) = self.route(e.route_id, e.trip_id).await? else {
                    return Ok(());
                };
                let eta = eta_after(e.occurred_at, route.estimated_duration())?;
                let progress = TripProgress {
                    trip_id: e.trip_id,
                    driver_id: e.driver_id,
                    vehicle_id: e.vehicle_id,
                    route_id: e.route_id,
                    started_at: e.occurred_at,
                    last_checkpoint: None,
                    checkpoints_reached: 0,
                    incidents: 0,
                    eta,
                };
                tracing::debug!(trip_id = %e.trip_id, %eta, "tracking trip");
                self.trips.write().await.insert(e.trip_id, progress);
            }
            FleetEvent::CheckpointReached(e) => {
                if !self.trips.read().await.contains_key(&e.trip_id) {
                    return Ok(());
                }
                let route = self.route(e.route_id, e.trip_id).await?;
                let eta = match route {
                    Some(route) => match route.checkpoint_position(&e.checkpoint) {
                        Some(index) => {
                            let left = remaining_after(
                                route.estimated_duration(),
                                index,
                                route.checkpoints().len(),
                            );
                            Some(eta_after(e.occurred_at, left)?)
                        }
                        None => None,
                    },
                    None => None,
                };

                let mut trips = self.trips.write().await;
                if let Some(progress) = trips.get_mut(&e.trip_id) {
                    progress.last_checkpoint = Some(e.checkpoint.clone());
                    progress.checkpoints_reached += 1;
                    if let Some(eta) = eta {
                        progress.eta = eta;
                    }
                    tracing::info!(
                        trip_id = %e.trip_id,
                        checkpoint = %e.checkpoint,
                        eta = %progress.eta,
                        "trip progress updated"
                    );
                }
            }
            FleetEvent::IncidentOccurred(e) => {
                if let Some(progress) = self.trips.write().await.get_mut(&e.trip_id) {
                    progress.incidents += 1;
                }
            }
            FleetEvent::DeliveryCompleted(e) => {
                self.trips.write().await.remove(&e.trip_id);
            }
            FleetEvent::TripCancelled(e) => {
                self.trips.write().await.remove(&e.trip_id);
            }
            _ => {}
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.trips.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for TripProgressView {
    fn name(&self) -> &'static str {
        "TripProgressView"
    }

    fn count(&self) -> usize {
        self.trips.try_read().map(|t| t.len()).unwrap_or(0)
    }
}
