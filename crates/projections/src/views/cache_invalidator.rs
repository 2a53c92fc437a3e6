//! Drops read cache entries made stale by committed events.

use std::sync::Arc;

use async_trait::async_trait;
use domain::cache::keys;
use domain::{FleetEvent, ReadCache};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Removes the cache keys an event invalidates.
///
/// | Events | Keys |
/// |--------|------|
/// | Driver* | `drivers:all` |
/// | VehicleStateChanged | `vehicles:all` |
/// | Route* | `routes:all`, `route:{id}` |
/// | Trip lifecycle | `trip:{id}` |
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn ReadCache>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn ReadCache>) -> Self {
        Self {
            cache,
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }
}

/// Keys made stale by `event`.
pub fn stale_keys(event: &FleetEvent) -> Vec<String> {
    match event {
        FleetEvent::DriverStatusChanged(_)
        | FleetEvent::DriverRenamed(_)
        | FleetEvent::DriverLicenseChanged(_) => vec![keys::DRIVERS.to_string()],
        FleetEvent::VehicleStateChanged(_) => vec![keys::VEHICLES.to_string()],
        FleetEvent::RouteCheckpointAdded(e) | FleetEvent::RouteCheckpointRemoved(e) => {
            vec![keys::ROUTES.to_string(), keys::route(e.route_id)]
        }
        FleetEvent::RouteDurationUpdated(e) => {
            vec![keys::ROUTES.to_string(), keys::route(e.route_id)]
        }
        FleetEvent::TripStarted(e) => vec![keys::trip(e.trip_id)],
        FleetEvent::CheckpointReached(e) => vec![keys::trip(e.trip_id)],
        FleetEvent::IncidentOccurred(e) => vec![keys::trip(e.trip_id)],
        FleetEvent::DeliveryCompleted(e) => vec![keys::trip(e.trip_id)],
        FleetEvent::TripCancelled(e) => vec![keys::trip(e.trip_id)],
    }
}

#[async_trait]
impl Projection for CacheInvalidator {
    fn name(&self) -> &'static str {
        "CacheInvalidator"
    }

    async fn handle(&self, event: &FleetEvent) -> Result<()> {
        for key in stale_keys(event) {
            self.cache.remove(&key).await;
            tracing::debug!(%key, "cache entry invalidated");
        }
        self.position.write().await.record(event);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}
