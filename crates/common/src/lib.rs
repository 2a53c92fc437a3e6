//! Shared types for the fleet trip tracker.
//!
//! - [`AggregateId`] identifies every persisted aggregate
//! - [`SmartEnum`] and [`NameTable`] give closed enumerations a name/value lookup
//!   that is built once per type

pub mod smart_enum;
pub mod types;

pub use smart_enum::{NameTable, SmartEnum};
pub use types::AggregateId;
