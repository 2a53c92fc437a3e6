//! Read-side views fed by committed domain events.

mod cache_invalidator;
mod trip_progress;

pub use cache_invalidator::{CacheInvalidator, stale_keys};
pub use trip_progress::{TripProgress, TripProgressView, remaining_after};
