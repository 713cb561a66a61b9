//! External collaborators: road routing and elevation lookup.
//!
//! The planner only sees the traits below, so tests and the CLI can swap the
//! HTTP clients for in-memory fakes.

pub mod elevation;
pub mod routing;

use std::future::Future;

use thiserror::Error;
use tour_core::LatLng;

pub use elevation::{CachedElevation, OpenMeteoElevation};
pub use routing::OsrmRouter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("routing request timed out")]
    Timeout,
    #[error("no route found: {0}")]
    NoRoute(String),
    #[error("routing service unreachable: {0}")]
    Transport(String),
    #[error("invalid routing response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElevationError {
    #[error("elevation request timed out")]
    Timeout,
    #[error("elevation service unreachable: {0}")]
    Transport(String),
    #[error("invalid elevation response: {0}")]
    InvalidResponse(String),
}

/// Road-routing service.
pub trait RouteProvider: Send + Sync + 'static {
    /// Route through `points` in order using the named profile (e.g. `foot`).
    fn route(
        &self,
        points: &[LatLng],
        profile: &str,
    ) -> impl Future<Output = Result<Vec<LatLng>, RoutingError>> + Send;
}

/// Elevation lookup service.
pub trait ElevationProvider: Send + Sync + 'static {
    /// Elevation in meters for each point, index-aligned with the input.
    /// `None` marks a sample the service could not resolve.
    fn elevations(
        &self,
        points: &[LatLng],
    ) -> impl Future<Output = Result<Vec<Option<f64>>, ElevationError>> + Send;
}
