//! REST API routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use tour_core::{LatLng, Mode};

use crate::api::{request_id, ws};
use crate::planner::{CommandOutcome, PlannerError, TourCommand};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/tour", get(get_tour))
        .route("/v1/waypoints", post(append_waypoint))
        .route("/v1/waypoints", delete(clear_waypoints))
        .route("/v1/waypoints/undo", post(undo_last))
        .route("/v1/waypoints/close-loop", post(close_loop))
        .route("/v1/waypoints/:index", delete(remove_waypoint))
        .route("/v1/waypoints/:index/insert-after", post(insert_after))
        .route("/v1/waypoints/:index/move-up", post(move_up))
        .route("/v1/waypoints/:index/move-down", post(move_down))
        .route("/v1/mode", put(set_mode))
        .route("/v1/stream", get(ws::ws_handler))
        .layer(middleware::from_fn(request_id::ensure_request_id))
}

// === Request types ===

#[derive(Debug, Deserialize)]
pub struct AppendWaypointRequest {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
    /// Append even when the point would close the loop.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: Mode,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    "OK"
}

async fn get_tour(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.planner().snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(json!(snapshot))),
        Err(err) => planner_unavailable(err),
    }
}

async fn append_waypoint(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AppendWaypointRequest>,
) -> impl IntoResponse {
    let command = TourCommand::Append {
        point: LatLng::new(req.lat, req.lon),
        force: req.force,
    };
    command_response(state.planner().execute(command).await)
}

async fn clear_waypoints(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    command_response(state.planner().clear().await)
}

async fn undo_last(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    command_response(state.planner().undo_last().await)
}

async fn close_loop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    command_response(state.planner().close_loop().await)
}

async fn remove_waypoint(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    command_response(state.planner().remove(index).await)
}

async fn insert_after(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    command_response(state.planner().insert_after(index).await)
}

async fn move_up(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    command_response(state.planner().move_up(index).await)
}

async fn move_down(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    command_response(state.planner().move_down(index).await)
}

async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetModeRequest>,
) -> impl IntoResponse {
    command_response(state.planner().set_mode(req.mode).await)
}

fn command_response(
    outcome: Result<CommandOutcome, PlannerError>,
) -> (StatusCode, Json<serde_json::Value>) {
    match outcome {
        Ok(CommandOutcome::Applied { generation }) => (
            StatusCode::OK,
            Json(json!({
                "status": "applied",
                "generation": generation,
            })),
        ),
        Ok(CommandOutcome::CloseLoopOffered) => (
            StatusCode::OK,
            Json(json!({
                "status": "close_loop_offered",
                "hint": "POST /v1/waypoints/close-loop, or resend with force=true to append",
            })),
        ),
        Err(PlannerError::Rejected(err)) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": err.to_string(),
            })),
        ),
        Err(err) => planner_unavailable(err),
    }
}

fn planner_unavailable(err: PlannerError) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!("Planner unavailable: {}", err);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": err.to_string(),
        })),
    )
}
