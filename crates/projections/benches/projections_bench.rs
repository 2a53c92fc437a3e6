use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::events::{CheckpointReachedData, TripStartedData};
use domain::{FleetEvent, ReadCache, Route};
use entity_store::{EntityStore, InMemoryEntityStore, Storable};
use projections::{CacheInvalidator, MemoryCache, Projection, ProjectionProcessor, TripProgressView};

fn bench_cache_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = MemoryCache::new();
    rt.block_on(async {
        for i in 0..1_000 {
            cache
                .set(&format!("trip:{i}"), serde_json::json!({ "n": i }), Duration::from_secs(600))
                .await;
        }
    });

    c.bench_function("projections/cache_get_hit", |b| {
        b.iter(|| rt.block_on(async { cache.get("trip:500").await.unwrap() }));
    });
}

fn bench_trip_progress_checkpoints(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEntityStore::<Route>::new();
    let checkpoints: Vec<String> = (0..20).map(|i| format!("CP{i}")).collect();
    let mut route = Route::new("Earth", "Pluto", TimeDelta::hours(40), &checkpoints).unwrap();
    rt.block_on(async { store.add(&mut route).await.unwrap() });

    let view = TripProgressView::new(Arc::new(store));
    let started = TripStartedData {
        trip_id: AggregateId::new(),
        driver_id: AggregateId::new(),
        vehicle_id: AggregateId::new(),
        route_id: route.id(),
        occurred_at: Utc::now(),
    };
    rt.block_on(async {
        view.handle(&FleetEvent::TripStarted(started.clone()))
            .await
            .unwrap()
    });

    let events: Vec<FleetEvent> = checkpoints
        .iter()
        .map(|name| {
            FleetEvent::CheckpointReached(CheckpointReachedData {
                trip_id: started.trip_id,
                route_id: route.id(),
                checkpoint: name.clone(),
                occurred_at: Utc::now(),
            })
        })
        .collect();

    c.bench_function("projections/trip_progress_20_checkpoints", |b| {
        b.iter(|| {
            rt.block_on(async {
                for event in &events {
                    view.handle(event).await.unwrap();
                }
            });
        });
    });
}

fn bench_processor_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache: Arc<dyn ReadCache> = Arc::new(MemoryCache::new());
    let view = TripProgressView::new(Arc::new(InMemoryEntityStore::<Route>::new()));
    let processor = ProjectionProcessor::new()
        .with(CacheInvalidator::new(cache))
        .with(view);
    let event = FleetEvent::CheckpointReached(CheckpointReachedData {
        trip_id: AggregateId::new(),
        route_id: AggregateId::new(),
        checkpoint: "CP".into(),
        occurred_at: Utc::now(),
    });

    c.bench_function("projections/processor_fan_out", |b| {
        b.iter(|| rt.block_on(processor.process_event(&event)));
    });
}

criterion_group!(
    benches,
    bench_cache_get,
    bench_trip_progress_checkpoints,
    bench_processor_fan_out,
);
criterion_main!(benches);
