//! Trip aggregate: the orchestration root binding a driver, vehicle and route.

mod aggregate;
mod state;
mod timeline;

pub use aggregate::Trip;
pub use state::TripStatus;
pub use timeline::TripEvent;
