//! Vehicle aggregate.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{EntityMeta, impl_aggregate};
use crate::enums::{VehicleCondition, VehicleModel, VehicleStatus};
use crate::error::DomainError;
use crate::events::{FleetEvent, VehicleStateChangedData};

/// A vehicle that carries cargo on trips.
///
/// A damaged vehicle is never Available: damage forces Maintenance, and only
/// [`Vehicle::repair`] brings it back into service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(flatten)]
    meta: EntityMeta,
    model: VehicleModel,
    cargo_capacity: Decimal,
    condition: VehicleCondition,
    status: VehicleStatus,
    #[serde(skip)]
    events: Vec<FleetEvent>,
}

impl_aggregate!(Vehicle, "Vehicle");

impl Vehicle {
    /// Creates a functional, available vehicle.
    pub fn new(model: VehicleModel, cargo_capacity: Decimal) -> Result<Self, DomainError> {
        if cargo_capacity < Decimal::ZERO {
            return Err(DomainError::invalid_state::<Self>(
                "cargo capacity must not be negative",
            ));
        }

        Ok(Self {
            meta: EntityMeta::new(),
            model,
            cargo_capacity,
            condition: VehicleCondition::Functional,
            status: VehicleStatus::Available,
            events: Vec::new(),
        })
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub fn model(&self) -> VehicleModel {
        self.model
    }

    pub fn cargo_capacity(&self) -> Decimal {
        self.cargo_capacity
    }

    pub fn condition(&self) -> VehicleCondition {
        self.condition
    }

    pub fn status(&self) -> VehicleStatus {
        self.status
    }

    /// Returns true if the vehicle may be assigned to a trip right now.
    pub fn can_assign(&self) -> bool {
        self.status == VehicleStatus::Available && self.condition == VehicleCondition::Functional
    }

    pub fn assign_to_trip(&mut self) -> Result<(), DomainError> {
        if !self.can_assign() {
            return Err(self.transition_error("assign to a trip"));
        }
        self.change(VehicleStatus::OnTrip, self.condition);
        Ok(())
    }

    /// Returns the vehicle from a trip. Vehicles that are not on a trip keep
    /// their status, so a vehicle grounded mid-trip stays in Maintenance.
    pub fn release_from_trip(&mut self) {
        if self.status == VehicleStatus::OnTrip {
            self.change(VehicleStatus::Available, self.condition);
        }
    }

    pub fn mark_damaged(&mut self) {
        self.change(VehicleStatus::Maintenance, VehicleCondition::Damaged);
    }

    pub fn repair(&mut self) -> Result<(), DomainError> {
        if self.status == VehicleStatus::OnTrip {
            return Err(self.transition_error("repair"));
        }
        self.change(VehicleStatus::Available, VehicleCondition::Functional);
        Ok(())
    }

    fn transition_error(&self, operation: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            aggregate_type: "Vehicle",
            aggregate_id: self.meta.id,
            operation,
            current_state: format!("{}/{}", self.status, self.condition),
        }
    }

    fn change(&mut self, status: VehicleStatus, condition: VehicleCondition) {
        if status == self.status && condition == self.condition {
            return;
        }

        let previous_status = std::mem::replace(&mut self.status, status);
        let previous_condition = std::mem::replace(&mut self.condition, condition);
        let event = FleetEvent::VehicleStateChanged(VehicleStateChangedData {
            vehicle_id: self.meta.id,
            previous_status,
            status,
            previous_condition,
            condition,
            occurred_at: Utc::now(),
        });
        self.record(event);
    }
}
