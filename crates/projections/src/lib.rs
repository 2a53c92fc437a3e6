//! Read side of the fleet trip tracker.
//!
//! This crate provides:
//! - [`MemoryCache`], the in-process [`ReadCache`](domain::ReadCache)
//! - [`Projection`] and the [`ProjectionProcessor`] that subscribes projections
//!   to the event bus
//! - [`TripProgressView`] for active trips and their ETA
//! - [`CacheInvalidator`] for dropping stale cache entries

pub mod cache;
pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use cache::MemoryCache;
pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{CacheInvalidator, TripProgress, TripProgressView};
