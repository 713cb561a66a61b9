//! Core data models for the tour planner.

use serde::{Deserialize, Serialize};

/// A geographic coordinate in decimal degrees.
///
/// Used both for user-placed waypoints and for route geometry vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// A user-authored control point. Replaced wholesale when moved.
pub type Waypoint = LatLng;

/// How new waypoints are connected to the tour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Segments are road-routed by the routing service
    #[default]
    Automatic,
    /// Segments are drawn as straight lines
    Manual,
}

/// Where the route synthesizer currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisPhase {
    /// Fewer than two waypoints, nothing to draw
    #[default]
    Idle,
    /// Geometry is final for the current waypoint list
    Settled,
    /// Waiting on the routing service
    RoutingInFlight,
    /// Drawing straight segments past the frozen prefix
    ManualDrawing,
}

/// One point of the elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub distance_km: f64,
    pub elevation_m: f64,
}

/// Aggregated track statistics.
///
/// `None` means "unknown", which is distinct from a flat (zero) result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub length_km: Option<f64>,
    pub elevation_gain_m: Option<f64>,
    pub elevation_loss_m: Option<f64>,
    pub min_elevation_m: Option<f64>,
    pub max_elevation_m: Option<f64>,
}

impl TrackStats {
    /// Stats for a track too short to measure.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }
}

/// Notification published to consumers whenever the tour changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TourEvent {
    GeometryChanged {
        generation: u64,
        points: Vec<LatLng>,
    },
    ProfileChanged {
        generation: u64,
        samples: Vec<ElevationSample>,
    },
    StatsChanged {
        generation: u64,
        stats: TrackStats,
    },
    RoutingFailed {
        generation: u64,
        reason: String,
    },
}

impl TourEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TourEvent::GeometryChanged { generation, .. }
            | TourEvent::ProfileChanged { generation, .. }
            | TourEvent::StatsChanged { generation, .. }
            | TourEvent::RoutingFailed { generation, .. } => *generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlng_accepts_lng_alias() {
        let point: LatLng = serde_json::from_str(r#"{"lat": 45.0, "lng": 9.0}"#).unwrap();
        assert_eq!(point, LatLng::new(45.0, 9.0));
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Manual).unwrap(), "\"manual\"");
        let mode: Mode = serde_json::from_str("\"automatic\"").unwrap();
        assert_eq!(mode, Mode::Automatic);
    }

    #[test]
    fn unknown_stats_serialize_as_null() {
        let value = serde_json::to_value(TrackStats::unknown()).unwrap();
        assert!(value["length_km"].is_null());
        assert!(value["elevation_gain_m"].is_null());
    }

    #[test]
    fn events_are_tagged() {
        let event = TourEvent::RoutingFailed {
            generation: 3,
            reason: "no route".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "routing_failed");
        assert_eq!(event.generation(), 3);
    }
}
