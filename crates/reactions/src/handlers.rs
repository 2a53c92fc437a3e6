//! Reactions that keep driver and vehicle availability in line with trips.
//!
//! | Event | Driver | Vehicle |
//! |-------|--------|---------|
//! | TripStarted | OnTrip | OnTrip |
//! | DeliveryCompleted | Available | released |
//! | TripCancelled | Available | released |
//! | IncidentOccurred (damaging) | Available | Damaged, Maintenance |
//!
//! Delivery is at least once, so every reaction is idempotent.

use async_trait::async_trait;
use domain::{CancelSignal, DomainError, EventHandler, FleetEvent, VehicleStatus};

use crate::resources::FleetResources;

fn handled(handler: &'static str) {
    metrics::counter!("reactions_handled_total", "handler" => handler).increment(1);
}

/// Puts the trip's driver and vehicle on the trip.
pub struct TripStartedHandler {
    resources: FleetResources,
}

impl TripStartedHandler {
    pub fn new(resources: FleetResources) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl EventHandler for TripStartedHandler {
    fn name(&self) -> &'static str {
        "TripStartedHandler"
    }

    fn handles(&self, event: &FleetEvent) -> bool {
        matches!(event, FleetEvent::TripStarted(_))
    }

    #[tracing::instrument(skip_all, fields(handler = self.name()))]
    async fn handle(&self, event: &FleetEvent, cancel: &CancelSignal) -> Result<(), DomainError> {
        let FleetEvent::TripStarted(e) = event else {
            return Ok(());
        };

        self.resources
            .update_driver(self.name(), e.driver_id, cancel, |d| d.mark_on_trip())
            .await?;
        self.resources
            .update_vehicle(self.name(), e.vehicle_id, cancel, |v| {
                // Already assigned: a redelivered event.
                if v.status() == VehicleStatus::OnTrip {
                    return Ok(());
                }
                v.assign_to_trip()
            })
            .await?;

        tracing::info!(
            trip_id = %e.trip_id,
            driver_id = %e.driver_id,
            vehicle_id = %e.vehicle_id,
            "driver and vehicle on trip"
        );
        handled(self.name());
        Ok(())
    }
}

/// Frees the driver and vehicle once the delivery is done.
pub struct DeliveryCompletedHandler {
    resources: FleetResources,
}

impl DeliveryCompletedHandler {
    pub fn new(resources: FleetResources) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl EventHandler for DeliveryCompletedHandler {
    fn name(&self) -> &'static str {
        "DeliveryCompletedHandler"
    }

    fn handles(&self, event: &FleetEvent) -> bool {
        matches!(event, FleetEvent::DeliveryCompleted(_))
    }

    #[tracing::instrument(skip_all, fields(handler = self.name()))]
    async fn handle(&self, event: &FleetEvent, cancel: &CancelSignal) -> Result<(), DomainError> {
        let FleetEvent::DeliveryCompleted(e) = event else {
            return Ok(());
        };

        release(&self.resources, self.name(), e.driver_id, e.vehicle_id, cancel).await?;
        tracing::info!(trip_id = %e.trip_id, "delivery completed, resources released");
        handled(self.name());
        Ok(())
    }
}

/// Frees the driver and vehicle of a cancelled trip.
pub struct TripCancelledHandler {
    resources: FleetResources,
}

impl TripCancelledHandler {
    pub fn new(resources: FleetResources) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl EventHandler for TripCancelledHandler {
    fn name(&self) -> &'static str {
        "TripCancelledHandler"
    }

    fn handles(&self, event: &FleetEvent) -> bool {
        matches!(event, FleetEvent::TripCancelled(_))
    }

    #[tracing::instrument(skip_all, fields(handler = self.name()))]
    async fn handle(&self, event: &FleetEvent, cancel: &CancelSignal) -> Result<(), DomainError> {
        let FleetEvent::TripCancelled(e) = event else {
            return Ok(());
        };

        release(&self.resources, self.name(), e.driver_id, e.vehicle_id, cancel).await?;
        tracing::info!(
            trip_id = %e.trip_id,
            previous = %e.previous,
            reason = %e.reason,
            "trip cancelled, resources released"
        );
        handled(self.name());
        Ok(())
    }
}

/// Grounds the vehicle after a damaging incident and frees the driver.
pub struct IncidentOccurredHandler {
    resources: FleetResources,
}

impl IncidentOccurredHandler {
    pub fn new(resources: FleetResources) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl EventHandler for IncidentOccurredHandler {
    fn name(&self) -> &'static str {
        "IncidentOccurredHandler"
    }

    fn handles(&self, event: &FleetEvent) -> bool {
        matches!(event, FleetEvent::IncidentOccurred(_))
    }

    #[tracing::instrument(skip_all, fields(handler = self.name()))]
    async fn handle(&self, event: &FleetEvent, cancel: &CancelSignal) -> Result<(), DomainError> {
        let FleetEvent::IncidentOccurred(e) = event else {
            return Ok(());
        };

        if !e.incident.is_damaging() {
            tracing::info!(
                trip_id = %e.trip_id,
                incident = %e.incident,
                details = e.details.as_deref().unwrap_or_default(),
                "non-damaging incident"
            );
            handled(self.name());
            return Ok(());
        }

        self.resources
            .update_vehicle(self.name(), e.vehicle_id, cancel, |v| {
                v.mark_damaged();
                Ok(())
            })
            .await?;
        self.resources
            .update_driver(self.name(), e.driver_id, cancel, |d| d.mark_available())
            .await?;

        tracing::info!(
            trip_id = %e.trip_id,
            vehicle_id = %e.vehicle_id,
            incident = %e.incident,
            "vehicle sent to maintenance"
        );
        handled(self.name());
        Ok(())
    }
}

async fn release(
    resources: &FleetResources,
    handler: &'static str,
    driver_id: common::AggregateId,
    vehicle_id: common::AggregateId,
    cancel: &CancelSignal,
) -> Result<(), DomainError> {
    resources
        .update_driver(handler, driver_id, cancel, |d| d.mark_available())
        .await?;
    resources
        .update_vehicle(handler, vehicle_id, cancel, |v| {
            v.release_from_trip();
            Ok(())
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use common::AggregateId;
    use domain::events::{IncidentOccurredData, TripStartedData};
    use domain::{
        Driver, DriverStatus, EventBus, LicenseLevel, Repository, RetryOrchestrator, RetryPolicy,
        TripEventType, Vehicle, VehicleCondition, VehicleModel,
    };
    use entity_store::{InMemoryEntityStore, Storable};
    use rust_decimal::Decimal;

    use super::*;

    async fn resources() -> (FleetResources, AggregateId, AggregateId) {
        let retry = RetryOrchestrator::new(RetryPolicy::default());
        let bus = Arc::new(EventBus::empty());
        let drivers = Repository::<Driver>::new(
            Arc::new(InMemoryEntityStore::<Driver>::new()),
            retry,
            bus.clone(),
        );
        let vehicles = Repository::<Vehicle>::new(
            Arc::new(InMemoryEntityStore::<Vehicle>::new()),
            retry,
            bus,
        );

        let cancel = CancelSignal::never();
        let mut driver = Driver::new("Han Solo", LicenseLevel::Veteran).unwrap();
        drivers.add(&mut driver, &cancel).await.unwrap();
        let mut vehicle = Vehicle::new(VehicleModel::HoverTruck, Decimal::new(10, 0)).unwrap();
        vehicles.add(&mut vehicle, &cancel).await.unwrap();

        (FleetResources::new(drivers, vehicles), driver.id(), vehicle.id())
    }

    fn started(driver_id: AggregateId, vehicle_id: AggregateId) -> FleetEvent {
        FleetEvent::TripStarted(TripStartedData {
            trip_id: AggregateId::new(),
            driver_id,
            vehicle_id,
            route_id: AggregateId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn trip_started_is_idempotent() {
        let (resources, driver_id, vehicle_id) = resources().await;
        let handler = TripStartedHandler::new(resources.clone());
        let event = started(driver_id, vehicle_id);

        handler.handle(&event, &CancelSignal::never()).await.unwrap();
        handler.handle(&event, &CancelSignal::never()).await.unwrap();

        let driver = resources.drivers().find_by_id(driver_id).await.unwrap();
        let vehicle = resources.vehicles().find_by_id(vehicle_id).await.unwrap();
        assert_eq!(driver.status(), DriverStatus::OnTrip);
        assert_eq!(vehicle.status(), VehicleStatus::OnTrip);
        assert_eq!(vehicle.version().as_i64(), 2);
    }

    #[tokio::test]
    async fn trip_started_fails_for_grounded_vehicle() {
        let (resources, driver_id, vehicle_id) = resources().await;
        let mut vehicle = resources.vehicles().find_by_id(vehicle_id).await.unwrap();
        vehicle.mark_damaged();
        resources
            .vehicles()
            .update(&mut vehicle, &CancelSignal::never())
            .await
            .unwrap();

        let handler = TripStartedHandler::new(resources);
        let err = handler
            .handle(&started(driver_id, vehicle_id), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn missing_resources_are_skipped() {
        let (resources, _, _) = resources().await;
        let handler = TripStartedHandler::new(resources);

        let result = handler
            .handle(
                &started(AggregateId::new(), AggregateId::new()),
                &CancelSignal::never(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_damaging_incident_changes_nothing() {
        let (resources, driver_id, vehicle_id) = resources().await;
        let handler = IncidentOccurredHandler::new(resources.clone());
        let event = FleetEvent::IncidentOccurred(IncidentOccurredData {
            trip_id: AggregateId::new(),
            driver_id,
            vehicle_id,
            incident: TripEventType::IncidentOccurred,
            details: Some("flat tyre".into()),
            occurred_at: Utc::now(),
        });

        handler.handle(&event, &CancelSignal::never()).await.unwrap();

        let vehicle = resources.vehicles().find_by_id(vehicle_id).await.unwrap();
        assert_eq!(vehicle.condition(), VehicleCondition::Functional);
        assert_eq!(vehicle.version().as_i64(), 1);
    }

    #[tokio::test]
    async fn handlers_select_their_event() {
        let (resources, driver_id, vehicle_id) = resources().await;
        let event = started(driver_id, vehicle_id);

        assert!(TripStartedHandler::new(resources.clone()).handles(&event));
        assert!(!DeliveryCompletedHandler::new(resources.clone()).handles(&event));
        assert!(!TripCancelledHandler::new(resources.clone()).handles(&event));
        assert!(!IncidentOccurredHandler::new(resources).handles(&event));
    }
}
