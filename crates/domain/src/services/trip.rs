use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, SmartEnum};
use entity_store::Storable;

use crate::cache::{ReadCache, keys};
use crate::commands::{CancelTrip, RecordTripEvent, StartTrip};
use crate::driver::Driver;
use crate::enums::TripEventType;
use crate::error::DomainError;
use crate::repository::Repository;
use crate::response::{ResponseStatus, ServiceResponse};
use crate::retry::CancelSignal;
use crate::route::Route;
use crate::trip::Trip;
use crate::vehicle::Vehicle;

use super::{EntityOps, bad_request, respond};

/// Service for starting trips and recording their progress.
///
/// Starting a trip only checks that the driver and vehicle are free. Marking
/// them as busy is left to the reactions to `TripStarted`.
#[derive(Clone)]
pub struct TripService {
    ops: EntityOps<Trip>,
    drivers: Repository<Driver>,
    vehicles: Repository<Vehicle>,
    routes: Repository<Route>,
}

impl TripService {
    pub fn new(
        trips: Repository<Trip>,
        drivers: Repository<Driver>,
        vehicles: Repository<Vehicle>,
        routes: Repository<Route>,
        cache: Arc<dyn ReadCache>,
    ) -> Self {
        Self {
            ops: EntityOps::new(trips, cache),
            drivers,
            vehicles,
            routes,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ops.set_cache_ttl(ttl);
        self
    }

    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.ops.set_cancel_signal(cancel);
        self
    }

    /// Creates and starts a trip.
    ///
    /// The driver, vehicle and route must exist, the driver must be
    /// available and the vehicle assignable.
    #[tracing::instrument(skip(self))]
    pub async fn start_trip(&self, cmd: StartTrip) -> ServiceResponse<Trip> {
        let result = async {
            let (driver, vehicle) = futures_util::try_join!(
                self.drivers.find_by_id(cmd.driver_id),
                self.vehicles.find_by_id(cmd.vehicle_id),
            )?;
            self.routes.find_by_id(cmd.route_id).await?;

            if !driver.is_available() {
                return Err(DomainError::Validation(format!(
                    "driver {} is not available",
                    driver.id()
                )));
            }
            if !vehicle.can_assign() {
                return Err(DomainError::Validation(format!(
                    "vehicle {} cannot be assigned while {}/{}",
                    vehicle.id(),
                    vehicle.status(),
                    vehicle.condition()
                )));
            }

            let mut trip = Trip::create(cmd.driver_id, cmd.vehicle_id, cmd.route_id)?;
            trip.start()?;
            tracing::info!(
                trip_id = %trip.id(),
                driver_id = %cmd.driver_id,
                vehicle_id = %cmd.vehicle_id,
                route_id = %cmd.route_id,
                "starting trip"
            );
            self.ops.repo().add(&mut trip, self.ops.cancel()).await?;
            Ok(trip)
        }
        .await;
        if result.is_ok() {
            metrics::counter!("trips_started_total").increment(1);
        }
        respond::<Trip, _>("start_trip", result, ResponseStatus::Created)
    }

    /// Records a timeline event named by `event_type`.
    ///
    /// CheckpointReached records a checkpoint, DeliveryCompleted and
    /// TripCompleted complete the trip, and anything else is recorded as an
    /// incident.
    #[tracing::instrument(skip(self))]
    pub async fn record_event(&self, cmd: RecordTripEvent) -> ServiceResponse<Trip> {
        let Some(event_type) = TripEventType::from_name(&cmd.event_type, true) else {
            return bad_request::<Trip, _>("record_event", "Invalid event type.");
        };
        let details = cmd.details;

        self.ops
            .modify("record_event", cmd.trip_id, move |trip| match event_type {
                TripEventType::CheckpointReached => {
                    trip.record_checkpoint(details.as_deref().unwrap_or("Checkpoint"))
                }
                TripEventType::DeliveryCompleted | TripEventType::TripCompleted => trip.complete(),
                incident => trip.record_incident(
                    incident,
                    Some(details.clone().unwrap_or_else(|| "Incident".to_string())),
                ),
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_trip(&self, trip_id: AggregateId) -> ServiceResponse<Trip> {
        self.ops.modify("complete_trip", trip_id, Trip::complete).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_trip(&self, cmd: CancelTrip) -> ServiceResponse<Trip> {
        let reason = cmd.reason;
        self.ops
            .modify("cancel_trip", cmd.trip_id, move |trip| trip.cancel(&reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: AggregateId) -> ServiceResponse<Trip> {
        self.ops.get_by_id(id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id_cached(&self, id: AggregateId) -> ServiceResponse<Trip> {
        self.ops.get_by_id_cached(&keys::trip(id), id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self) -> ServiceResponse<Vec<Trip>> {
        self.ops.get_all().await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AggregateId) -> ServiceResponse<()> {
        let response = self.ops.delete(id).await;
        self.ops.invalidating(&keys::trip(id), response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_range(&self, ids: &[AggregateId]) -> ServiceResponse<()> {
        let mut response = self.ops.delete_range(ids).await;
        for id in ids {
            response = self.ops.invalidating(&keys::trip(*id), response).await;
        }
        response
    }
}
