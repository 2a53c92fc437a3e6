//! Integration tests for the HTTP adapter.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use reactions::Fleet;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    api::create_app(Arc::new(Fleet::in_memory()), metrics_handle())
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create(app: &axum::Router, uri: &str, body: Value) -> String {
    let (status, json) = send(app, "POST", uri, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]["id"].as_str().unwrap().to_string()
}

struct Crew {
    driver: String,
    vehicle: String,
    route: String,
}

async fn crew(app: &axum::Router) -> Crew {
    Crew {
        driver: create(
            app,
            "/drivers",
            json!({ "name": "Han Solo", "license_level": "Veteran" }),
        )
        .await,
        vehicle: create(
            app,
            "/vehicles",
            json!({ "model": "hovertruck", "cargo_capacity": "120.5" }),
        )
        .await,
        route: create(
            app,
            "/routes",
            json!({
                "origin": "Earth",
                "destination": "Mars",
                "estimated_duration_minutes": 600,
                "checkpoints": ["Moon", "Phobos"]
            }),
        )
        .await,
    }
}

async fn start_trip(app: &axum::Router, crew: &Crew) -> String {
    create(
        app,
        "/trips",
        json!({ "driver_id": crew.driver, "vehicle_id": crew.vehicle, "route_id": crew.route }),
    )
    .await
}

mod system {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let app = setup();
        let (status, json) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_trips"], 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = setup();
        send(&app, "GET", "/drivers", None).await;

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}

mod resources {
    use super::*;

    #[tokio::test]
    async fn test_register_and_get_driver() {
        let app = setup();
        let id = create(
            &app,
            "/drivers",
            json!({ "name": "Leia Organa", "license_level": "Rookie" }),
        )
        .await;

        let (status, json) = send(&app, "GET", &format!("/drivers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "Success");
        assert_eq!(json["data"]["name"], "Leia Organa");
        assert!(json["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_license_is_bad_request() {
        let app = setup();
        let (status, json) = send(
            &app,
            "POST",
            "/drivers",
            Some(json!({ "name": "Chewbacca", "license_level": "veteran" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "BadRequest");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let app = setup();
        for uri in ["/drivers/42", "/vehicles/nope", "/routes/x", "/trips/abc/progress"] {
            let (status, json) = send(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(!json["errors"].as_array().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_vehicle_is_not_found() {
        let app = setup();
        let uri = format!("/vehicles/{}", common::AggregateId::new());
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_route_checkpoint_editing() {
        let app = setup();
        let crew = crew(&app).await;

        let uri = format!("/routes/{}/checkpoints", crew.route);
        let (status, _) = send(&app, "POST", &uri, Some(json!({ "name": "Deimos" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "DELETE", &format!("{uri}/Moon"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "DELETE", &format!("{uri}/Ganymede"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, json) = send(&app, "GET", &format!("/routes/{}", crew.route), None).await;
        assert_eq!(json["data"]["checkpoints"], json!(["Phobos", "Deimos"]));
    }

    #[tokio::test]
    async fn test_route_duration_out_of_range() {
        let app = setup();
        let (status, json) = send(
            &app,
            "POST",
            "/routes",
            Some(json!({
                "origin": "Earth",
                "destination": "Mars",
                "estimated_duration_minutes": 1_000_000_000_000_i64,
                "checkpoints": []
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["data"].is_null());

        let (_, json) = send(&app, "GET", "/routes", None).await;
        assert!(json["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_driver() {
        let app = setup();
        let crew = crew(&app).await;
        let uri = format!("/drivers/{}", crew.driver);

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod trips {
    use super::*;

    #[tokio::test]
    async fn test_trip_lifecycle() {
        let app = setup();
        let crew = crew(&app).await;
        let trip = start_trip(&app, &crew).await;

        let (_, json) = send(&app, "GET", &format!("/drivers/{}", crew.driver), None).await;
        assert_eq!(json["data"]["status"], "OnTrip");

        let (status, json) = send(
            &app,
            "POST",
            &format!("/trips/{trip}/events"),
            Some(json!({ "event_type": "checkpointreached", "details": "Moon" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["timeline"].as_array().unwrap().len(), 2);

        let (status, json) = send(&app, "GET", &format!("/trips/{trip}/progress"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["last_checkpoint"], "Moon");

        let (status, json) = send(&app, "POST", &format!("/trips/{trip}/complete"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "Completed");

        let (status, _) = send(&app, "GET", &format!("/trips/{trip}/progress"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, json) = send(&app, "GET", &format!("/vehicles/{}", crew.vehicle), None).await;
        assert_eq!(json["data"]["status"], "Available");
    }

    #[tokio::test]
    async fn test_invalid_event_type() {
        let app = setup();
        let crew = crew(&app).await;
        let trip = start_trip(&app, &crew).await;

        let (status, json) = send(
            &app,
            "POST",
            &format!("/trips/{trip}/events"),
            Some(json!({ "event_type": "WarpSpeed" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0], "Invalid event type.");
    }

    #[tokio::test]
    async fn test_cancel_after_complete_is_rejected() {
        let app = setup();
        let crew = crew(&app).await;
        let trip = start_trip(&app, &crew).await;
        send(&app, "POST", &format!("/trips/{trip}/complete"), None).await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/trips/{trip}/cancel"),
            Some(json!({ "reason": "changed our minds" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_with_unknown_driver() {
        let app = setup();
        let crew = crew(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            "/trips",
            Some(json!({
                "driver_id": common::AggregateId::new(),
                "vehicle_id": crew.vehicle,
                "route_id": crew.route
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_trips() {
        let app = setup();
        let crew = crew(&app).await;
        start_trip(&app, &crew).await;

        let (status, json) = send(&app, "GET", "/trips", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
    }
}
