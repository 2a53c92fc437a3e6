//! HTTP adapter for the fleet trip tracker.
//!
//! Translates JSON requests into service calls and service envelopes back
//! into HTTP responses, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use reactions::{Fleet, FleetError, FleetOptions, FleetStores};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::{delivery_routes, drivers, trips, vehicles};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(fleet: Arc<Fleet>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/drivers", post(drivers::register).get(drivers::list))
        .route("/drivers/{id}", get(drivers::get).delete(drivers::delete))
        .route("/drivers/{id}/rename", post(drivers::rename))
        .route("/drivers/{id}/license", post(drivers::change_license))
        .route("/vehicles", post(vehicles::register).get(vehicles::list))
        .route("/vehicles/{id}", get(vehicles::get).delete(vehicles::delete))
        .route("/vehicles/{id}/damage", post(vehicles::mark_damaged))
        .route("/vehicles/{id}/repair", post(vehicles::repair))
        .route("/routes", post(delivery_routes::create).get(delivery_routes::list))
        .route(
            "/routes/{id}",
            get(delivery_routes::get).delete(delivery_routes::delete),
        )
        .route("/routes/{id}/checkpoints", post(delivery_routes::add_checkpoint))
        .route(
            "/routes/{id}/checkpoints/{name}",
            delete(delivery_routes::remove_checkpoint),
        )
        .route("/routes/{id}/duration", post(delivery_routes::update_duration))
        .route("/trips", post(trips::start).get(trips::list))
        .route("/trips/{id}", get(trips::get))
        .route("/trips/{id}/events", post(trips::record_event))
        .route("/trips/{id}/complete", post(trips::complete))
        .route("/trips/{id}/cancel", post(trips::cancel))
        .route("/trips/{id}/progress", get(trips::progress))
        .with_state(fleet)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the fleet the configuration asks for: PostgreSQL stores when
/// `DATABASE_URL` is set, in-memory stores otherwise.
pub async fn build_fleet(config: &Config, options: FleetOptions) -> Result<Fleet, FleetError> {
    let stores = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .map_err(entity_store::StoreError::from)?;
            tracing::info!("using PostgreSQL entity stores");
            FleetStores::postgres(pool).await?
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory entity stores");
            FleetStores::in_memory()
        }
    };
    Ok(Fleet::new(stores, options))
}
