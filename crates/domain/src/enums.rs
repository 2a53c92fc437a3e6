//! Closed enumerations used by the fleet aggregates.

use common::smart_enum;

smart_enum! {
    /// Grade of a driver's license.
    pub enum LicenseLevel {
        Rookie = 1,
        Veteran = 2,
    }
}

smart_enum! {
    #[derive(Default)]
    pub enum DriverStatus {
        #[default]
        Available = 1,
        OnTrip = 2,
    }
}

smart_enum! {
    pub enum VehicleModel {
        HoverTruck = 1,
        RocketVan = 2,
    }
}

smart_enum! {
    #[derive(Default)]
    pub enum VehicleCondition {
        #[default]
        Functional = 1,
        Damaged = 2,
    }
}

smart_enum! {
    #[derive(Default)]
    pub enum VehicleStatus {
        #[default]
        Available = 1,
        OnTrip = 2,
        Maintenance = 3,
    }
}

smart_enum! {
    /// Kind of entry in a trip's timeline.
    pub enum TripEventType {
        TripStarted = 1,
        CheckpointReached = 2,
        IncidentOccurred = 3,
        AsteroidFieldEncountered = 4,
        CosmicStormHit = 5,
        EmergencyMaintenanceRequired = 6,
        DeliveryCompleted = 7,
        TripCompleted = 8,
        Other = 99,
    }
}

impl TripEventType {
    /// Incidents that take the vehicle out of service.
    pub fn is_damaging(&self) -> bool {
        matches!(
            self,
            TripEventType::AsteroidFieldEncountered
                | TripEventType::CosmicStormHit
                | TripEventType::EmergencyMaintenanceRequired
        )
    }

    /// Event types that may be recorded as an incident on an active trip.
    pub fn is_incident(&self) -> bool {
        self.is_damaging() || matches!(self, TripEventType::IncidentOccurred | TripEventType::Other)
    }
}
