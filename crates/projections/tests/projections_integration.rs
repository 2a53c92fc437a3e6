//! Projections subscribed to a live event bus behind the domain services.

use std::sync::Arc;

use domain::{
    CreateRoute, Driver, DriverService, EventBus, ReadCache, RecordTripEvent, RegisterDriver,
    RegisterVehicle, Repository, RetryOrchestrator, RetryPolicy, Route, RouteService, StartTrip,
    Trip, TripService, Vehicle, VehicleService,
};
use entity_store::{EntityStore, InMemoryEntityStore, Storable};
use projections::{CacheInvalidator, MemoryCache, ProjectionProcessor, TripProgressView};
use rust_decimal::Decimal;

struct Harness {
    drivers: DriverService,
    vehicles: VehicleService,
    routes: RouteService,
    trips: TripService,
    cache: MemoryCache,
    progress: TripProgressView,
}

fn harness() -> Harness {
    let cache = MemoryCache::new();
    let shared: Arc<dyn ReadCache> = Arc::new(cache.clone());
    let route_store: Arc<dyn EntityStore<Route>> = Arc::new(InMemoryEntityStore::<Route>::new());
    let progress = TripProgressView::new(Arc::clone(&route_store));

    let processor = ProjectionProcessor::new()
        .with(CacheInvalidator::new(Arc::clone(&shared)))
        .with(progress.clone());
    let bus = Arc::new(EventBus::builder().handler(processor).build());
    let retry = RetryOrchestrator::new(RetryPolicy::default());

    let drivers = Repository::<Driver>::new(
        Arc::new(InMemoryEntityStore::<Driver>::new()),
        retry,
        bus.clone(),
    );
    let vehicles = Repository::<Vehicle>::new(
        Arc::new(InMemoryEntityStore::<Vehicle>::new()),
        retry,
        bus.clone(),
    );
    let routes = Repository::<Route>::new(route_store, retry, bus.clone());
    let trips = Repository::<Trip>::new(Arc::new(InMemoryEntityStore::<Trip>::new()), retry, bus);

    Harness {
        drivers: DriverService::new(drivers.clone(), Arc::clone(&shared)),
        vehicles: VehicleService::new(vehicles.clone(), Arc::clone(&shared)),
        routes: RouteService::new(routes.clone(), Arc::clone(&shared)),
        trips: TripService::new(trips, drivers, vehicles, routes, shared),
        cache,
        progress,
    }
}

async fn start_trip(h: &Harness) -> Trip {
    let driver = h
        .drivers
        .register(RegisterDriver::new("Han Solo", "Veteran"))
        .await
        .data
        .unwrap();
    let vehicle = h
        .vehicles
        .register(RegisterVehicle::new("HoverTruck", Decimal::new(100, 0)))
        .await
        .data
        .unwrap();
    let route = h
        .routes
        .create(CreateRoute {
            origin: "Earth".into(),
            destination: "Mars".into(),
            estimated_duration_minutes: 600,
            checkpoints: vec!["Moon".into(), "Phobos".into()],
        })
        .await
        .data
        .unwrap();

    h.trips
        .start_trip(StartTrip {
            driver_id: driver.id(),
            vehicle_id: vehicle.id(),
            route_id: route.id(),
        })
        .await
        .data
        .unwrap()
}

mod trip_progress {
    use super::*;

    #[tokio::test]
    async fn view_follows_trip_lifecycle() {
        let h = harness();
        let trip = start_trip(&h).await;

        let progress = h.progress.get(trip.id()).await.unwrap();
        assert_eq!(progress.route_id, trip.route_id());
        assert_eq!(progress.last_checkpoint, None);

        h.trips
            .record_event(RecordTripEvent {
                trip_id: trip.id(),
                event_type: "CheckpointReached".into(),
                details: Some("Phobos".into()),
            })
            .await;
        let progress = h.progress.get(trip.id()).await.unwrap();
        assert_eq!(progress.last_checkpoint.as_deref(), Some("Phobos"));
        assert!(progress.eta <= chrono::Utc::now() + chrono::TimeDelta::seconds(1));

        assert!(h.trips.complete_trip(trip.id()).await.is_success());
        assert!(h.progress.get(trip.id()).await.is_none());
    }
}

mod cache_invalidation {
    use super::*;

    #[tokio::test]
    async fn route_change_invalidates_cached_route() {
        let h = harness();
        let trip = start_trip(&h).await;
        let route_id = trip.route_id();

        let cached = h.routes.get_by_id_cached(route_id).await.data.unwrap();
        assert_eq!(cached.checkpoints().len(), 2);
        assert!(h.cache.get(&format!("route:{route_id}")).await.is_some());

        h.routes.add_checkpoint(route_id, "Deimos").await;
        assert!(h.cache.get(&format!("route:{route_id}")).await.is_none());

        let cached = h.routes.get_by_id_cached(route_id).await.data.unwrap();
        assert_eq!(cached.checkpoints().len(), 3);
    }

    #[tokio::test]
    async fn trip_events_invalidate_trip_detail() {
        let h = harness();
        let trip = start_trip(&h).await;

        h.trips.get_by_id_cached(trip.id()).await;
        assert!(h.cache.get(&format!("trip:{}", trip.id())).await.is_some());

        h.trips
            .record_event(RecordTripEvent {
                trip_id: trip.id(),
                event_type: "CosmicStormHit".into(),
                details: None,
            })
            .await;
        assert!(h.cache.get(&format!("trip:{}", trip.id())).await.is_none());
        assert_eq!(h.progress.get(trip.id()).await.unwrap().incidents, 1);
    }
}
