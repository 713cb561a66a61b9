//! Spatial math for tour geometry: great-circle distances and interpolation.

use crate::models::LatLng;

/// Mean Earth radius used for all great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Two points closer than this are treated as the same place.
pub const COINCIDENT_TOLERANCE_M: f64 = 0.5;

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon) / 1000.0
}

/// Total length of a polyline in kilometers.
pub fn path_length_km(points: &[LatLng]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// Running distance from the first point, one entry per input point.
///
/// The first entry is always `0.0`; an empty input yields an empty vector.
pub fn cumulative_distances_km(points: &[LatLng]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (idx, point) in points.iter().enumerate() {
        if idx > 0 {
            total += haversine_km(points[idx - 1], *point);
        }
        distances.push(total);
    }
    distances
}

/// Linear interpolation between two coordinates (`t = 0` gives `a`).
pub fn interpolate(a: LatLng, b: LatLng, t: f64) -> LatLng {
    LatLng {
        lat: a.lat + (b.lat - a.lat) * t,
        lon: a.lon + (b.lon - a.lon) * t,
    }
}

/// Midpoint of two coordinates in degree space.
///
/// Waypoints are placed by hand a few kilometers apart at most, so the
/// planar midpoint is indistinguishable from the geodesic one.
pub fn midpoint(a: LatLng, b: LatLng) -> LatLng {
    interpolate(a, b, 0.5)
}

/// True when two points are within [`COINCIDENT_TOLERANCE_M`] of each other.
pub fn coincident(a: LatLng, b: LatLng) -> bool {
    haversine_distance(a.lat, a.lon, b.lat, b.lon) <= COINCIDENT_TOLERANCE_M
}
