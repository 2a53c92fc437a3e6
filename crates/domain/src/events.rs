//! Domain events raised by the fleet aggregates.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::enums::{DriverStatus, LicenseLevel, TripEventType, VehicleCondition, VehicleStatus};
use crate::trip::TripStatus;

/// Every event an aggregate can buffer for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FleetEvent {
    DriverStatusChanged(DriverStatusChangedData),
    DriverRenamed(DriverRenamedData),
    DriverLicenseChanged(DriverLicenseChangedData),
    VehicleStateChanged(VehicleStateChangedData),
    RouteCheckpointAdded(RouteCheckpointData),
    RouteCheckpointRemoved(RouteCheckpointData),
    RouteDurationUpdated(RouteDurationUpdatedData),
    TripStarted(TripStartedData),
    CheckpointReached(CheckpointReachedData),
    IncidentOccurred(IncidentOccurredData),
    DeliveryCompleted(DeliveryCompletedData),
    TripCancelled(TripCancelledData),
}

impl DomainEvent for FleetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FleetEvent::DriverStatusChanged(_) => "DriverStatusChanged",
            FleetEvent::DriverRenamed(_) => "DriverRenamed",
            FleetEvent::DriverLicenseChanged(_) => "DriverLicenseChanged",
            FleetEvent::VehicleStateChanged(_) => "VehicleStateChanged",
            FleetEvent::RouteCheckpointAdded(_) => "RouteCheckpointAdded",
            FleetEvent::RouteCheckpointRemoved(_) => "RouteCheckpointRemoved",
            FleetEvent::RouteDurationUpdated(_) => "RouteDurationUpdated",
            FleetEvent::TripStarted(_) => "TripStarted",
            FleetEvent::CheckpointReached(_) => "CheckpointReached",
            FleetEvent::IncidentOccurred(_) => "IncidentOccurred",
            FleetEvent::DeliveryCompleted(_) => "DeliveryCompleted",
            FleetEvent::TripCancelled(_) => "TripCancelled",
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        match self {
            FleetEvent::DriverStatusChanged(e) => e.driver_id,
            FleetEvent::DriverRenamed(e) => e.driver_id,
            FleetEvent::DriverLicenseChanged(e) => e.driver_id,
            FleetEvent::VehicleStateChanged(e) => e.vehicle_id,
            FleetEvent::RouteCheckpointAdded(e) | FleetEvent::RouteCheckpointRemoved(e) => {
                e.route_id
            }
            FleetEvent::RouteDurationUpdated(e) => e.route_id,
            FleetEvent::TripStarted(e) => e.trip_id,
            FleetEvent::CheckpointReached(e) => e.trip_id,
            FleetEvent::IncidentOccurred(e) => e.trip_id,
            FleetEvent::DeliveryCompleted(e) => e.trip_id,
            FleetEvent::TripCancelled(e) => e.trip_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FleetEvent::DriverStatusChanged(e) => e.occurred_at,
            FleetEvent::DriverRenamed(e) => e.occurred_at,
            FleetEvent::DriverLicenseChanged(e) => e.occurred_at,
            FleetEvent::VehicleStateChanged(e) => e.occurred_at,
            FleetEvent::RouteCheckpointAdded(e) | FleetEvent::RouteCheckpointRemoved(e) => {
                e.occurred_at
            }
            FleetEvent::RouteDurationUpdated(e) => e.occurred_at,
            FleetEvent::TripStarted(e) => e.occurred_at,
            FleetEvent::CheckpointReached(e) => e.occurred_at,
            FleetEvent::IncidentOccurred(e) => e.occurred_at,
            FleetEvent::DeliveryCompleted(e) => e.occurred_at,
            FleetEvent::TripCancelled(e) => e.occurred_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStatusChangedData {
    pub driver_id: AggregateId,
    pub previous: DriverStatus,
    pub current: DriverStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRenamedData {
    pub driver_id: AggregateId,
    pub previous: String,
    pub current: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverLicenseChangedData {
    pub driver_id: AggregateId,
    pub previous: LicenseLevel,
    pub current: LicenseLevel,
    pub occurred_at: DateTime<Utc>,
}

/// Status and condition of a vehicle before and after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStateChangedData {
    pub vehicle_id: AggregateId,
    pub previous_status: VehicleStatus,
    pub status: VehicleStatus,
    pub previous_condition: VehicleCondition,
    pub condition: VehicleCondition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCheckpointData {
    pub route_id: AggregateId,
    pub checkpoint: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDurationUpdatedData {
    pub route_id: AggregateId,
    pub previous: Duration,
    pub current: Duration,
    pub occurred_at: DateTime<Utc>,
}

/// A trip left Pending. Carries every id the reaction handlers need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripStartedData {
    pub trip_id: AggregateId,
    pub driver_id: AggregateId,
    pub vehicle_id: AggregateId,
    pub route_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointReachedData {
    pub trip_id: AggregateId,
    pub route_id: AggregateId,
    pub checkpoint: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentOccurredData {
    pub trip_id: AggregateId,
    pub driver_id: AggregateId,
    pub vehicle_id: AggregateId,
    pub incident: TripEventType,
    pub details: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryCompletedData {
    pub trip_id: AggregateId,
    pub driver_id: AggregateId,
    pub vehicle_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCancelledData {
    pub trip_id: AggregateId,
    pub driver_id: AggregateId,
    pub vehicle_id: AggregateId,
    /// Status the trip was cancelled from.
    pub previous: TripStatus,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}
