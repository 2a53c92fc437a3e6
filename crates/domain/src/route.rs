//! Route aggregate.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{EntityMeta, impl_aggregate};
use crate::error::DomainError;
use crate::events::{FleetEvent, RouteCheckpointData, RouteDurationUpdatedData};

/// An origin/destination pair with an estimated duration and an ordered list
/// of named checkpoints. Checkpoint names are unique within a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(flatten)]
    meta: EntityMeta,
    origin: String,
    destination: String,
    estimated_duration: Duration,
    checkpoints: Vec<String>,
    #[serde(skip)]
    events: Vec<FleetEvent>,
}

impl_aggregate!(Route, "Route");

/// Longest estimated duration a route accepts.
pub const MAX_ESTIMATED_DURATION: Duration = Duration::from_secs(365 * 24 * 3600);

fn checked_duration(duration: TimeDelta) -> Result<Duration, &'static str> {
    let duration = duration
        .to_std()
        .map_err(|_| "estimated duration must not be negative")?;
    if duration > MAX_ESTIMATED_DURATION {
        return Err("estimated duration must not exceed 365 days");
    }
    Ok(duration)
}

impl Route {
    /// Creates a route. Blank checkpoint names are skipped and repeated ones
    /// collapsed, keeping the first occurrence.
    pub fn new<I, S>(
        origin: &str,
        destination: &str,
        estimated_duration: TimeDelta,
        checkpoints: I,
    ) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let origin = origin.trim();
        let destination = destination.trim();
        if origin.is_empty() || destination.is_empty() {
            return Err(DomainError::invalid_state::<Self>(
                "origin and destination are required",
            ));
        }
        let estimated_duration =
            checked_duration(estimated_duration).map_err(DomainError::invalid_state::<Self>)?;

        let mut unique: Vec<String> = Vec::new();
        for name in checkpoints {
            let name = name.as_ref().trim();
            if !name.is_empty() && !unique.iter().any(|c| c == name) {
                unique.push(name.to_string());
            }
        }

        Ok(Self {
            meta: EntityMeta::new(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            estimated_duration,
            checkpoints: unique,
            events: Vec::new(),
        })
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn estimated_duration(&self) -> Duration {
        self.estimated_duration
    }

    pub fn checkpoints(&self) -> &[String] {
        &self.checkpoints
    }

    /// Index of a checkpoint, matched case-insensitively.
    pub fn checkpoint_position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.checkpoints
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn add_checkpoint(&mut self, name: &str) -> Result<(), DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("checkpoint name is required".into()));
        }
        if self.checkpoints.iter().any(|c| c == name) {
            return Ok(());
        }

        self.checkpoints.push(name.to_string());
        let event = FleetEvent::RouteCheckpointAdded(RouteCheckpointData {
            route_id: self.meta.id,
            checkpoint: name.to_string(),
            occurred_at: Utc::now(),
        });
        self.record(event);
        Ok(())
    }

    /// Removes a checkpoint by exact name. Returns whether one was removed.
    pub fn remove_checkpoint(&mut self, name: &str) -> bool {
        let name = name.trim();
        let Some(index) = self.checkpoints.iter().position(|c| c == name) else {
            return false;
        };

        let checkpoint = self.checkpoints.remove(index);
        let event = FleetEvent::RouteCheckpointRemoved(RouteCheckpointData {
            route_id: self.meta.id,
            checkpoint,
            occurred_at: Utc::now(),
        });
        self.record(event);
        true
    }

    pub fn update_estimated_duration(&mut self, duration: TimeDelta) -> Result<(), DomainError> {
        let duration =
            checked_duration(duration).map_err(|e| DomainError::Validation(e.to_string()))?;
        if duration == self.estimated_duration {
            return Ok(());
        }

        let previous = std::mem::replace(&mut self.estimated_duration, duration);
        let event = FleetEvent::RouteDurationUpdated(RouteDurationUpdatedData {
            route_id: self.meta.id,
            previous,
            current: duration,
            occurred_at: Utc::now(),
        });
        self.record(event);
        Ok(())
    }
}
