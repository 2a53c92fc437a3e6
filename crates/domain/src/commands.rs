//! Service inputs.
//!
//! Enumerated fields arrive as text and are parsed by the services, so a bad
//! name comes back as a `BadRequest` envelope instead of a decode error.

use common::AggregateId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDriver {
    pub name: String,
    /// Parsed case-sensitively.
    pub license_level: String,
}

impl RegisterDriver {
    pub fn new(name: impl Into<String>, license_level: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            license_level: license_level.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterVehicle {
    /// Parsed case-insensitively.
    pub model: String,
    pub cargo_capacity: Decimal,
}

impl RegisterVehicle {
    pub fn new(model: impl Into<String>, cargo_capacity: Decimal) -> Self {
        Self {
            model: model.into(),
            cargo_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoute {
    pub origin: String,
    pub destination: String,
    pub estimated_duration_minutes: i64,
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTrip {
    pub driver_id: AggregateId,
    pub vehicle_id: AggregateId,
    pub route_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTripEvent {
    pub trip_id: AggregateId,
    /// A `TripEventType` name, parsed case-insensitively.
    pub event_type: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTrip {
    pub trip_id: AggregateId,
    pub reason: String,
}
