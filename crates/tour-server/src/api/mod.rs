//! HTTP and WebSocket API for the tour planner.

pub mod request_id;
mod routes;
pub mod ws;

use axum::Router;

pub fn routes() -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router()
}

#[cfg(test)]
mod tests;
