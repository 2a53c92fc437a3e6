//! Trip aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::{EntityMeta, impl_aggregate};
use crate::enums::TripEventType;
use crate::error::DomainError;
use crate::events::{
    CheckpointReachedData, DeliveryCompletedData, FleetEvent, IncidentOccurredData,
    TripCancelledData, TripStartedData,
};

use super::{TripEvent, TripStatus};

/// Trip aggregate root.
///
/// Binds one driver, one vehicle and one route for a single delivery. The
/// three ids are fixed at creation. Every transition appends an entry to the
/// timeline, which is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(flatten)]
    meta: EntityMeta,
    driver_id: AggregateId,
    vehicle_id: AggregateId,
    route_id: AggregateId,
    status: TripStatus,
    timeline: Vec<TripEvent>,
    #[serde(skip)]
    events: Vec<FleetEvent>,
}

impl_aggregate!(Trip, "Trip");

// Query methods
impl Trip {
    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub fn driver_id(&self) -> AggregateId {
        self.driver_id
    }

    pub fn vehicle_id(&self) -> AggregateId {
        self.vehicle_id
    }

    pub fn route_id(&self) -> AggregateId {
        self.route_id
    }

    pub fn status(&self) -> TripStatus {
        self.status
    }

    pub fn timeline(&self) -> &[TripEvent] {
        &self.timeline
    }

    /// When the trip left Pending, taken from its timeline.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timeline
            .iter()
            .find(|e| e.event_type == TripEventType::TripStarted)
            .map(|e| e.timestamp)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Trip {
    /// Creates a Pending trip. None of the ids may be nil.
    pub fn create(
        driver_id: AggregateId,
        vehicle_id: AggregateId,
        route_id: AggregateId,
    ) -> Result<Self, DomainError> {
        if driver_id.is_nil() || vehicle_id.is_nil() || route_id.is_nil() {
            return Err(DomainError::invalid_state::<Self>(
                "driver, vehicle and route are required",
            ));
        }

        Ok(Self {
            meta: EntityMeta::new(),
            driver_id,
            vehicle_id,
            route_id,
            status: TripStatus::Pending,
            timeline: Vec::new(),
            events: Vec::new(),
        })
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        if !self.status.can_start() {
            return Err(self.transition_error("start"));
        }

        let now = Utc::now();
        self.status = TripStatus::InProgress;
        self.append(TripEventType::TripStarted, Some("Trip started".into()), now);
        let event = FleetEvent::TripStarted(TripStartedData {
            trip_id: self.meta.id,
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            route_id: self.route_id,
            occurred_at: now,
        });
        self.record(event);
        Ok(())
    }

    pub fn record_checkpoint(&mut self, checkpoint: &str) -> Result<(), DomainError> {
        if !self.status.can_record() {
            return Err(self.transition_error("record a checkpoint on"));
        }
        let checkpoint = checkpoint.trim();
        if checkpoint.is_empty() {
            return Err(DomainError::Validation("checkpoint name is required".into()));
        }

        let now = Utc::now();
        self.append(
            TripEventType::CheckpointReached,
            Some(checkpoint.to_string()),
            now,
        );
        let event = FleetEvent::CheckpointReached(CheckpointReachedData {
            trip_id: self.meta.id,
            route_id: self.route_id,
            checkpoint: checkpoint.to_string(),
            occurred_at: now,
        });
        self.record(event);
        Ok(())
    }

    pub fn record_incident(
        &mut self,
        incident: TripEventType,
        details: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.status.can_record() {
            return Err(self.transition_error("record an incident on"));
        }
        if !incident.is_incident() {
            return Err(DomainError::Validation(format!(
                "{incident} is not an incident"
            )));
        }

        let now = Utc::now();
        self.append(incident, details.clone(), now);
        let event = FleetEvent::IncidentOccurred(IncidentOccurredData {
            trip_id: self.meta.id,
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            incident,
            details,
            occurred_at: now,
        });
        self.record(event);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        if !self.status.can_complete() {
            return Err(self.transition_error("complete"));
        }

        let now = Utc::now();
        self.status = TripStatus::Completed;
        self.append(
            TripEventType::DeliveryCompleted,
            Some("Delivery completed".into()),
            now,
        );
        let event = FleetEvent::DeliveryCompleted(DeliveryCompletedData {
            trip_id: self.meta.id,
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            occurred_at: now,
        });
        self.record(event);
        Ok(())
    }

    /// Cancels a Pending or InProgress trip. Cancelling twice is rejected.
    pub fn cancel(&mut self, reason: &str) -> Result<(), DomainError> {
        if !self.status.can_cancel() {
            return Err(self.transition_error("cancel"));
        }

        let now = Utc::now();
        let reason = reason.trim().to_string();
        let previous = std::mem::replace(&mut self.status, TripStatus::Cancelled);
        self.append(
            TripEventType::Other,
            Some(format!("Cancelled: {reason}")),
            now,
        );
        let event = FleetEvent::TripCancelled(TripCancelledData {
            trip_id: self.meta.id,
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            previous,
            reason,
            occurred_at: now,
        });
        self.record(event);
        Ok(())
    }

    fn append(&mut self, event_type: TripEventType, details: Option<String>, at: DateTime<Utc>) {
        self.timeline.push(TripEvent::new(event_type, details, at));
    }

    fn transition_error(&self, operation: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            aggregate_type: "Trip",
            aggregate_id: self.meta.id,
            operation,
            current_state: self.status.to_string(),
        }
    }
}
