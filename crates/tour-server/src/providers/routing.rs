//! OSRM-compatible road-routing client.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tour_core::LatLng;

use super::{RouteProvider, RoutingError};

/// HTTP client for an OSRM `route/v1` endpoint.
#[derive(Debug, Clone)]
pub struct OsrmRouter {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lon, lat]`.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn build_url(&self, points: &[LatLng], profile: &str) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson",
            self.base_url,
            profile,
            join_coordinates(points)
        )
    }
}

impl RouteProvider for OsrmRouter {
    async fn route(&self, points: &[LatLng], profile: &str) -> Result<Vec<LatLng>, RoutingError> {
        if points.len() < 2 {
            return Err(RoutingError::NoRoute("need at least 2 points".to_string()));
        }

        let url = self.build_url(points, profile);
        tracing::debug!("Routing {} points via {}", points.len(), self.base_url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        let payload: OsrmResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) if status.is_success() => {
                return Err(RoutingError::InvalidResponse(err.to_string()));
            }
            Err(_) => return Err(RoutingError::Transport(format!("routing service HTTP {status}"))),
        };

        parse_route(payload)
    }
}

fn parse_route(payload: OsrmResponse) -> Result<Vec<LatLng>, RoutingError> {
    if payload.code != "Ok" {
        let reason = payload.message.unwrap_or(payload.code);
        return Err(RoutingError::NoRoute(reason));
    }
    let route = payload
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::NoRoute("response contained no routes".to_string()))?;

    let coords: Vec<LatLng> = route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| LatLng::new(lat, lon))
        .collect();
    if coords.len() < 2 || coords.iter().any(|c| !c.is_finite()) {
        return Err(RoutingError::InvalidResponse(
            "route geometry has fewer than 2 valid points".to_string(),
        ));
    }
    Ok(coords)
}

fn map_transport_error(err: reqwest::Error) -> RoutingError {
    if err.is_timeout() {
        RoutingError::Timeout
    } else {
        RoutingError::Transport(err.to_string())
    }
}

fn join_coordinates(points: &[LatLng]) -> String {
    let mut buf = String::new();
    for (idx, point) in points.iter().enumerate() {
        if idx > 0 {
            buf.push(';');
        }
        buf.push_str(&format!("{:.6},{:.6}", point.lon, point.lat));
    }
    buf
}
