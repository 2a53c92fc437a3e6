//! Driver aggregate.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::aggregate::{EntityMeta, impl_aggregate};
use crate::enums::{DriverStatus, LicenseLevel};
use crate::error::DomainError;
use crate::events::{
    DriverLicenseChangedData, DriverRenamedData, DriverStatusChangedData, FleetEvent,
};

/// A driver who can be assigned to trips.
///
/// Status follows trip outcomes through the reaction handlers; a driver is
/// never deleted implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    #[serde(flatten)]
    meta: EntityMeta,
    name: String,
    license_level: LicenseLevel,
    status: DriverStatus,
    #[serde(skip)]
    events: Vec<FleetEvent>,
}

impl_aggregate!(Driver, "Driver");

impl Driver {
    /// Creates an Available driver. The name is trimmed and must not be blank.
    pub fn new(name: &str, license_level: LicenseLevel) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::invalid_state::<Self>("driver name is required"));
        }

        Ok(Self {
            meta: EntityMeta::new(),
            name: name.to_string(),
            license_level,
            status: DriverStatus::Available,
            events: Vec::new(),
        })
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn license_level(&self) -> LicenseLevel {
        self.license_level
    }

    pub fn status(&self) -> DriverStatus {
        self.status
    }

    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }

    pub fn mark_available(&mut self) {
        self.change_status(DriverStatus::Available);
    }

    pub fn mark_on_trip(&mut self) {
        self.change_status(DriverStatus::OnTrip);
    }

    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("driver name is required".into()));
        }
        if name == self.name {
            return Ok(());
        }

        let previous = std::mem::replace(&mut self.name, name.to_string());
        let event = FleetEvent::DriverRenamed(DriverRenamedData {
            driver_id: self.meta.id,
            previous,
            current: self.name.clone(),
            occurred_at: Utc::now(),
        });
        self.record(event);
        Ok(())
    }

    pub fn change_license(&mut self, level: LicenseLevel) {
        if level == self.license_level {
            return;
        }

        let previous = std::mem::replace(&mut self.license_level, level);
        let event = FleetEvent::DriverLicenseChanged(DriverLicenseChangedData {
            driver_id: self.meta.id,
            previous,
            current: level,
            occurred_at: Utc::now(),
        });
        self.record(event);
    }

    fn change_status(&mut self, status: DriverStatus) {
        if status == self.status {
            return;
        }

        let previous = std::mem::replace(&mut self.status, status);
        let event = FleetEvent::DriverStatusChanged(DriverStatusChangedData {
            driver_id: self.meta.id,
            previous,
            current: status,
            occurred_at: Utc::now(),
        });
        self.record(event);
    }
}
