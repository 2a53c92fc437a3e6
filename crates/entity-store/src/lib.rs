//! Version-checked persistence for fleet aggregates.
//!
//! Every stored entity carries a [`VersionToken`]. Writes compare the token the
//! caller holds against the stored one and fail with
//! [`StoreError::Conflict`] when they differ, so two writers that loaded the
//! same state cannot both commit.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod version;

pub use common::AggregateId;
pub use error::{Result, StoreError};
pub use memory::InMemoryEntityStore;
pub use postgres::PostgresEntityStore;
pub use store::{EntityStore, EntityStoreExt, Storable};
pub use version::VersionToken;
