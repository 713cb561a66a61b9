use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tour_core::LatLng;

use crate::{
    api,
    planner::{spawn_planner, PlannerOptions},
    providers::{ElevationError, ElevationProvider, RouteProvider, RoutingError},
    state::AppState,
};

/// Routes straight through the requested points with a midpoint per leg.
struct MidpointRouter;

impl RouteProvider for MidpointRouter {
    async fn route(&self, points: &[LatLng], _profile: &str) -> Result<Vec<LatLng>, RoutingError> {
        let mut out = Vec::new();
        for pair in points.windows(2) {
            out.push(pair[0]);
            out.push(LatLng::new(
                (pair[0].lat + pair[1].lat) / 2.0,
                (pair[0].lon + pair[1].lon) / 2.0,
            ));
        }
        out.extend(points.last().copied());
        Ok(out)
    }
}

/// Elevation grows with latitude.
struct SlopeElevation;

impl ElevationProvider for SlopeElevation {
    async fn elevations(&self, points: &[LatLng]) -> Result<Vec<Option<f64>>, ElevationError> {
        Ok(points
            .iter()
            .map(|p| Some(500.0 + (p.lat - 45.0) * 10_000.0))
            .collect())
    }
}

fn setup_app() -> (axum::Router, Arc<AppState>) {
    let planner = spawn_planner(MidpointRouter, SlopeElevation, PlannerOptions::default());
    let state = Arc::new(AppState::new(planner));
    let app = api::routes().with_state(state.clone());
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_is_ok_and_echoes_request_id() {
    let (app, _state) = setup_app();

    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn request_id_is_minted_when_missing() {
    let (app, _state) = setup_app();
    let res = app.oneshot(empty("GET", "/health")).await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap();
    assert!(!id.is_empty());
}

#[tokio::test]
async fn appended_waypoints_produce_routed_tour() {
    let (app, state) = setup_app();

    for (lat, lon) in [(45.0, 9.0), (45.01, 9.01)] {
        let res = app
            .clone()
            .oneshot(post_json("/v1/waypoints", json!({ "lat": lat, "lon": lon })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await["status"], "applied");
    }
    state.planner().settled().await.unwrap();

    let res = app.oneshot(empty("GET", "/v1/tour")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tour = read_json(res).await;
    assert_eq!(tour["waypoints"].as_array().unwrap().len(), 2);
    assert_eq!(tour["geometry"].as_array().unwrap().len(), 3);
    assert_eq!(tour["until_index"], 1);
    assert_eq!(tour["phase"], "settled");
    assert_eq!(tour["mode"], "automatic");
    assert!(tour["stats"]["length_km"].as_f64().unwrap() > 1.0);
    assert_eq!(tour["stats"]["min_elevation_m"], 500.0);
    assert_eq!(tour["stats"]["max_elevation_m"], 600.0);
}

#[tokio::test]
async fn invalid_operations_are_conflicts() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(empty("POST", "/v1/waypoints/0/insert-after"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(read_json(res).await["error"].is_string());

    let res = app
        .clone()
        .oneshot(empty("DELETE", "/v1/waypoints/4"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .oneshot(empty("POST", "/v1/waypoints/close-loop"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn click_near_start_offers_loop_close() {
    let (app, state) = setup_app();
    for (lat, lon) in [(45.0, 9.0), (45.01, 9.01), (45.0, 9.02)] {
        app.clone()
            .oneshot(post_json("/v1/waypoints", json!({ "lat": lat, "lng": lon })))
            .await
            .unwrap();
    }

    let near_start = json!({ "lat": 45.0001, "lon": 9.0001 });
    let res = app
        .clone()
        .oneshot(post_json("/v1/waypoints", near_start.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["status"], "close_loop_offered");
    assert_eq!(state.planner().snapshot().await.unwrap().waypoints.len(), 3);

    let mut forced = near_start;
    forced["force"] = json!(true);
    let res = app
        .oneshot(post_json("/v1/waypoints", forced))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["status"], "applied");
    assert_eq!(state.planner().snapshot().await.unwrap().waypoints.len(), 4);
}

#[tokio::test]
async fn mode_switch_is_reflected_in_snapshot() {
    let (app, _state) = setup_app();

    let req = Request::builder()
        .method("PUT")
        .uri("/v1/mode")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "mode": "manual" }).to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let tour = read_json(app.oneshot(empty("GET", "/v1/tour")).await.unwrap()).await;
    assert_eq!(tour["mode"], "manual");
}

#[tokio::test]
async fn clearing_empties_the_tour() {
    let (app, state) = setup_app();
    for (lat, lon) in [(45.0, 9.0), (45.01, 9.01)] {
        app.clone()
            .oneshot(post_json("/v1/waypoints", json!({ "lat": lat, "lon": lon })))
            .await
            .unwrap();
    }
    let res = app
        .clone()
        .oneshot(empty("DELETE", "/v1/waypoints"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let snapshot = state.planner().settled().await.unwrap();
    assert!(snapshot.waypoints.is_empty());
    assert!(snapshot.geometry.is_empty());
    assert!(snapshot.stats.is_unknown());
}
