//! Cross-aggregate reactions to trip events.
//!
//! Starting, finishing or cancelling a trip changes the availability of its
//! driver and vehicle. The services only record the trip's own events; the
//! handlers in this crate react to them and update the other aggregates.
//!
//! [`Fleet`] assembles the whole application: stores, services, reaction
//! handlers and projections.

pub mod error;
pub mod fleet;
pub mod handlers;
pub mod resources;

pub use error::{FleetError, Result};
pub use fleet::{Fleet, FleetOptions, FleetStores};
pub use handlers::{
    DeliveryCompletedHandler, IncidentOccurredHandler, TripCancelledHandler, TripStartedHandler,
};
pub use resources::FleetResources;
