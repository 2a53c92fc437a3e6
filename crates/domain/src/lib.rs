//! Domain layer for the fleet trip tracker.
//!
//! This crate provides:
//! - Driver, Vehicle, Route and Trip aggregates with their state machines
//! - FleetEvent domain events and the EventBus that delivers them
//! - The retry orchestrator and the repository pipeline around the entity store
//! - ServiceResponse envelopes and the application services

pub mod aggregate;
pub mod cache;
pub mod commands;
pub mod dispatch;
pub mod driver;
pub mod enums;
pub mod error;
pub mod events;
pub mod repository;
pub mod response;
pub mod retry;
pub mod route;
pub mod services;
pub mod trip;
pub mod vehicle;

pub use aggregate::{Aggregate, DomainEvent, EntityMeta};
pub use cache::{DEFAULT_TTL, ReadCache};
pub use commands::{
    CancelTrip, CreateRoute, RecordTripEvent, RegisterDriver, RegisterVehicle, StartTrip,
};
pub use dispatch::{EventBus, EventBusBuilder, EventDispatcher, EventHandler};
pub use driver::Driver;
pub use enums::{
    DriverStatus, LicenseLevel, TripEventType, VehicleCondition, VehicleModel, VehicleStatus,
};
pub use error::DomainError;
pub use events::FleetEvent;
pub use repository::Repository;
pub use response::{ResponseStatus, ServiceResponse};
pub use retry::{CancelSignal, RetryOrchestrator, RetryPolicy, Retryable};
pub use route::Route;
pub use services::{DriverService, RouteService, TripService, VehicleService};
pub use trip::{Trip, TripEvent, TripStatus};
pub use vehicle::Vehicle;
