//! Composition root wiring stores, event buses, services and projections.

use std::sync::Arc;
use std::time::Duration;

use domain::{
    CancelSignal, DEFAULT_TTL, Driver, DriverService, EventBus, EventHandler, ReadCache,
    Repository, RetryOrchestrator, RetryPolicy, Route, RouteService, Trip, TripService, Vehicle,
    VehicleService,
};
use entity_store::{EntityStore, InMemoryEntityStore, PostgresEntityStore};
use projections::{CacheInvalidator, MemoryCache, ProjectionProcessor, TripProgressView};
use sqlx::PgPool;

use crate::handlers::{
    DeliveryCompletedHandler, IncidentOccurredHandler, TripCancelledHandler, TripStartedHandler,
};
use crate::resources::FleetResources;

/// One entity store per aggregate type.
#[derive(Clone)]
pub struct FleetStores {
    pub drivers: Arc<dyn EntityStore<Driver>>,
    pub vehicles: Arc<dyn EntityStore<Vehicle>>,
    pub routes: Arc<dyn EntityStore<Route>>,
    pub trips: Arc<dyn EntityStore<Trip>>,
}

impl FleetStores {
    pub fn in_memory() -> Self {
        Self {
            drivers: Arc::new(InMemoryEntityStore::<Driver>::new()),
            vehicles: Arc::new(InMemoryEntityStore::<Vehicle>::new()),
            routes: Arc::new(InMemoryEntityStore::<Route>::new()),
            trips: Arc::new(InMemoryEntityStore::<Trip>::new()),
        }
    }

    /// PostgreSQL stores sharing one pool. Runs the migrations first.
    pub async fn postgres(pool: PgPool) -> crate::Result<Self> {
        let drivers = PostgresEntityStore::<Driver>::new(pool.clone());
        drivers.run_migrations().await?;
        tracing::info!("database migrations applied");

        Ok(Self {
            drivers: Arc::new(drivers),
            vehicles: Arc::new(PostgresEntityStore::<Vehicle>::new(pool.clone())),
            routes: Arc::new(PostgresEntityStore::<Route>::new(pool.clone())),
            trips: Arc::new(PostgresEntityStore::<Trip>::new(pool)),
        })
    }
}

/// Tunables for [`Fleet::new`].
#[derive(Debug, Clone)]
pub struct FleetOptions {
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    /// Raised on shutdown to abort in-flight write retries.
    pub cancel: CancelSignal,
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cache_ttl: DEFAULT_TTL,
            cancel: CancelSignal::never(),
        }
    }
}

/// The assembled application: services, read side and the buses between them.
///
/// Writes made by the services are delivered to the reaction handlers and the
/// projections. Writes made by the reaction handlers are delivered to the
/// projections only, so reactions never trigger further reactions.
#[derive(Clone)]
pub struct Fleet {
    pub drivers: DriverService,
    pub vehicles: VehicleService,
    pub routes: RouteService,
    pub trips: TripService,
    pub progress: TripProgressView,
    pub cache: MemoryCache,
    bus: EventBus,
}

impl Fleet {
    pub fn new(stores: FleetStores, options: FleetOptions) -> Self {
        let retry = RetryOrchestrator::new(options.retry);
        let cache = MemoryCache::new();
        let shared_cache: Arc<dyn ReadCache> = Arc::new(cache.clone());
        let progress = TripProgressView::new(Arc::clone(&stores.routes));

        let processor: Arc<dyn EventHandler> = Arc::new(
            ProjectionProcessor::new()
                .with(CacheInvalidator::new(Arc::clone(&shared_cache)))
                .with(progress.clone()),
        );
        let subscribers = Arc::new(EventBus::builder().shared(Arc::clone(&processor)).build());

        let resources = FleetResources::new(
            Repository::new(Arc::clone(&stores.drivers), retry, subscribers.clone()),
            Repository::new(Arc::clone(&stores.vehicles), retry, subscribers),
        );
        let bus = EventBus::builder()
            .handler(TripStartedHandler::new(resources.clone()))
            .handler(DeliveryCompletedHandler::new(resources.clone()))
            .handler(TripCancelledHandler::new(resources.clone()))
            .handler(IncidentOccurredHandler::new(resources))
            .shared(processor)
            .build();
        let dispatcher = Arc::new(bus.clone());

        let drivers = Repository::new(stores.drivers, retry, dispatcher.clone());
        let vehicles = Repository::new(stores.vehicles, retry, dispatcher.clone());
        let routes = Repository::new(stores.routes, retry, dispatcher.clone());
        let trips = Repository::new(stores.trips, retry, dispatcher);

        tracing::info!(handlers = ?bus.handler_names(), "fleet assembled");

        let ttl = options.cache_ttl;
        let cancel = options.cancel;
        Self {
            drivers: DriverService::new(drivers.clone(), Arc::clone(&shared_cache))
                .with_cache_ttl(ttl)
                .with_cancel_signal(cancel.clone()),
            vehicles: VehicleService::new(vehicles.clone(), Arc::clone(&shared_cache))
                .with_cache_ttl(ttl)
                .with_cancel_signal(cancel.clone()),
            routes: RouteService::new(routes.clone(), Arc::clone(&shared_cache))
                .with_cache_ttl(ttl)
                .with_cancel_signal(cancel.clone()),
            trips: TripService::new(trips, drivers, vehicles, routes, shared_cache)
                .with_cache_ttl(ttl)
                .with_cancel_signal(cancel),
            progress,
            cache,
            bus,
        }
    }

    /// A fleet over in-memory stores with default options.
    pub fn in_memory() -> Self {
        Self::new(FleetStores::in_memory(), FleetOptions::default())
    }

    /// Names of the handlers service writes are delivered to.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.bus.handler_names()
    }
}
