//! HTTP route handlers.

pub mod delivery_routes;
pub mod drivers;
pub mod health;
pub mod metrics;
pub mod trips;
pub mod vehicles;

use serde::Deserialize;

/// Query string of the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Bypass the read cache and reload.
    #[serde(default)]
    pub refresh: bool,
}
