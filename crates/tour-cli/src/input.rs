//! Waypoint input parsing.
//!
//! Two formats are accepted: a JSON array of `{"lat": .., "lon": ..}` objects
//! (or `[lat, lon]` pairs), or plain text with one `lat,lon` per line. Blank
//! lines and lines starting with `#` are skipped in the text format.

use serde::Deserialize;
use thiserror::Error;
use tour_core::LatLng;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("line {line}: {reason}")]
    Line { line: usize, reason: String },
    #[error("invalid JSON waypoints: {0}")]
    Json(#[from] serde_json::Error),
    #[error("coordinate out of range: {lat}, {lon}")]
    OutOfRange { lat: f64, lon: f64 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPoint {
    Object(LatLng),
    Pair([f64; 2]),
}

/// Parse a waypoint file in either supported format.
pub fn parse_waypoints(text: &str) -> Result<Vec<LatLng>, InputError> {
    let trimmed = text.trim_start();
    let points = if trimmed.starts_with('[') {
        let raw: Vec<JsonPoint> = serde_json::from_str(trimmed)?;
        raw.into_iter()
            .map(|point| match point {
                JsonPoint::Object(point) => point,
                JsonPoint::Pair([lat, lon]) => LatLng::new(lat, lon),
            })
            .collect()
    } else {
        let mut points = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let point = parse_point(line).map_err(|reason| InputError::Line {
                line: idx + 1,
                reason,
            })?;
            points.push(point);
        }
        points
    };

    for point in &points {
        check_range(*point)?;
    }
    Ok(points)
}

/// Parse a single `lat,lon` pair. Also used as the clap value parser for
/// `--point`.
pub fn parse_point(value: &str) -> Result<LatLng, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{value}'"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
    let point = LatLng::new(lat, lon);
    check_range(point).map_err(|err| err.to_string())?;
    Ok(point)
}

fn check_range(point: LatLng) -> Result<(), InputError> {
    if !point.is_finite() || point.lat.abs() > 90.0 || point.lon.abs() > 180.0 {
        return Err(InputError::OutOfRange {
            lat: point.lat,
            lon: point.lon,
        });
    }
    Ok(())
}
