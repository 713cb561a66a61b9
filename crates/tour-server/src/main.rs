//! Tour Server - incremental route and elevation planning backend

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tour_server::api;
use tour_server::cache::ElevationCache;
use tour_server::config::Config;
use tour_server::planner::spawn_planner;
use tour_server::providers::{CachedElevation, OpenMeteoElevation, OsrmRouter};
use tour_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("tour_server=debug".parse()?))
        .init();

    tracing::info!("Starting Tour Server...");

    let config = Config::from_env();
    let port = config.server_port;
    tracing::info!(
        "Routing via {} ({}), elevation via {} ({} method)",
        config.router_url,
        config.routing_profile,
        config.elevation_url,
        config.gain_method.name()
    );

    let router = OsrmRouter::new(config.router_url.clone(), config.router_timeout());
    let cache = Arc::new(ElevationCache::new(
        config.elevation_cache_ttl(),
        config.elevation_cache_max_entries,
    ));
    let elevation = CachedElevation::new(
        OpenMeteoElevation::new(
            config.elevation_url.clone(),
            config.elevation_timeout(),
            config.elevation_max_points_per_request,
        ),
        cache,
    );
    let planner = spawn_planner(router, elevation, config.planner_options());
    let state = Arc::new(AppState::new(planner));

    // Build the app
    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
