//! Elevation profiling for route geometry.
//!
//! Route geometry can hold thousands of vertices, so only a bounded number
//! of samples is sent to the elevation service. Gain and loss come from one
//! of two noise-robust algorithms selected by [`GainMethod`].

use serde::{Deserialize, Serialize};

use crate::models::{ElevationSample, LatLng};
use crate::spatial::{cumulative_distances_km, path_length_km};

/// Upper bound on samples sent to the elevation service per profile.
pub const DEFAULT_MAX_SAMPLES: usize = 100;

/// Geometry shorter than this has no profile at all.
pub const MIN_PROFILE_POINTS: usize = 3;

/// Gain/loss accumulation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum GainMethod {
    /// Per-step thresholding: ignore deltas under `floor_m`, clamp the rest
    /// to `cap_m`.
    Simple { floor_m: f64, cap_m: f64 },
    /// Moving-average smoothing plus a running reference that only moves
    /// once the smoothed deviation exceeds `max(floor_m, k * variability)`.
    Hysteresis {
        floor_m: f64,
        cap_m: f64,
        window: usize,
        k: f64,
    },
}

impl GainMethod {
    pub fn name(&self) -> &'static str {
        match self {
            GainMethod::Simple { .. } => "simple",
            GainMethod::Hysteresis { .. } => "hysteresis",
        }
    }

    pub fn default_for_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(GainMethod::Simple {
                floor_m: 0.5,
                cap_m: 50.0,
            }),
            "hysteresis" => Some(GainMethod::Hysteresis {
                floor_m: 2.0,
                cap_m: 150.0,
                window: 5,
                k: 1.0,
            }),
            _ => None,
        }
    }

    /// Same method with a different noise floor.
    pub fn with_floor(self, floor: f64) -> Self {
        match self {
            GainMethod::Simple { cap_m, .. } => GainMethod::Simple {
                floor_m: floor,
                cap_m,
            },
            GainMethod::Hysteresis { cap_m, window, k, .. } => GainMethod::Hysteresis {
                floor_m: floor,
                cap_m,
                window,
                k,
            },
        }
    }

    /// Same method with a different per-step cap.
    pub fn with_cap(self, cap: f64) -> Self {
        match self {
            GainMethod::Simple { floor_m, .. } => GainMethod::Simple { floor_m, cap_m: cap },
            GainMethod::Hysteresis {
                floor_m, window, k, ..
            } => GainMethod::Hysteresis {
                floor_m,
                cap_m: cap,
                window,
                k,
            },
        }
    }
}

impl Default for GainMethod {
    fn default() -> Self {
        GainMethod::Hysteresis {
            floor_m: 2.0,
            cap_m: 150.0,
            window: 5,
            k: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub max_samples: usize,
    pub method: GainMethod,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            method: GainMethod::default(),
        }
    }
}

/// Points to look up, cut from one geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRequest {
    /// Sampled points, in route order. Always ends with the last vertex.
    pub points: Vec<LatLng>,
    /// Full-resolution route length.
    pub length_km: f64,
}

/// Profiler output before rounding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElevationProfile {
    pub samples: Vec<ElevationSample>,
    pub length_km: Option<f64>,
    pub gain_m: Option<f64>,
    pub loss_m: Option<f64>,
    pub min_m: Option<f64>,
    pub max_m: Option<f64>,
}

impl ElevationProfile {
    /// Length is known but no elevation could be derived.
    pub fn length_only(length_km: f64) -> Self {
        Self {
            length_km: Some(length_km),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElevationProfiler {
    config: ProfileConfig,
}

impl ElevationProfiler {
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    /// Pick the points to query, or `None` when the geometry is too short to
    /// profile (its stats stay unknown).
    pub fn plan(&self, geometry: &[LatLng]) -> Option<ProfileRequest> {
        if geometry.len() < MIN_PROFILE_POINTS {
            return None;
        }
        let points = downsample_indices(geometry.len(), self.config.max_samples)
            .into_iter()
            .map(|idx| geometry[idx])
            .collect();
        Some(ProfileRequest {
            points,
            length_km: path_length_km(geometry),
        })
    }

    /// Build the profile from the elevation service's answer.
    ///
    /// `elevations` is index-aligned with `request.points`; `None` entries
    /// (and non-finite values) are failed lookups. Interior failures are
    /// interpolated on distance, leading and trailing ones are dropped.
    pub fn profile(&self, request: &ProfileRequest, elevations: &[Option<f64>]) -> ElevationProfile {
        let distances = cumulative_distances_km(&request.points);
        let samples = fill_gaps(&distances, elevations);
        if samples.len() < 2 {
            return ElevationProfile::length_only(request.length_km);
        }

        let values: Vec<f64> = samples.iter().map(|s| s.elevation_m).collect();
        let (gain, loss) = gain_loss(&values, &self.config.method);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        ElevationProfile {
            samples,
            length_km: Some(request.length_km),
            gain_m: Some(gain),
            loss_m: Some(loss),
            min_m: Some(min),
            max_m: Some(max),
        }
    }
}

/// Indices `0, stride, 2*stride, ...` with `stride = ceil(len / max_samples)`,
/// always ending on `len - 1`.
pub fn downsample_indices(len: usize, max_samples: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let stride = len.div_ceil(max_samples.max(1)).max(1);
    let mut indices: Vec<usize> = (0..len).step_by(stride).collect();
    if indices.last() != Some(&(len - 1)) {
        indices.push(len - 1);
    }
    indices
}

/// Total gain and loss (both non-negative) for an elevation series.
pub fn gain_loss(elevations: &[f64], method: &GainMethod) -> (f64, f64) {
    match *method {
        GainMethod::Simple { floor_m, cap_m } => simple_gain_loss(elevations, floor_m, cap_m),
        GainMethod::Hysteresis {
            floor_m,
            cap_m,
            window,
            k,
        } => hysteresis_gain_loss(elevations, floor_m, cap_m, window, k),
    }
}

pub fn simple_gain_loss(elevations: &[f64], floor_m: f64, cap_m: f64) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    for w in elevations.windows(2) {
        let delta = w[1] - w[0];
        if delta.abs() < floor_m {
            continue;
        }
        let step = delta.abs().min(cap_m);
        if delta > 0.0 {
            gain += step;
        } else {
            loss += step;
        }
    }
    (gain, loss)
}

pub fn hysteresis_gain_loss(
    elevations: &[f64],
    floor_m: f64,
    cap_m: f64,
    window: usize,
    k: f64,
) -> (f64, f64) {
    if elevations.len() < 2 {
        return (0.0, 0.0);
    }
    let smoothed = moving_average(elevations, window);
    let variability = local_variability(elevations, &smoothed, window);

    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut reference = smoothed[0];
    for (idx, &value) in smoothed.iter().enumerate().skip(1) {
        let deviation = value - reference;
        let threshold = floor_m.max(k * variability[idx]);
        if deviation.abs() <= threshold {
            continue;
        }
        let step = deviation.abs().min(cap_m);
        if deviation > 0.0 {
            gain += step;
        } else {
            loss += step;
        }
        reference = value;
    }
    (gain, loss)
}

/// Centered moving average, truncated at the edges.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    (0..values.len())
        .map(|idx| {
            let (start, end) = window_bounds(idx, values.len(), window);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Mean absolute residual between raw and smoothed values around each index.
fn local_variability(raw: &[f64], smoothed: &[f64], window: usize) -> Vec<f64> {
    (0..raw.len())
        .map(|idx| {
            let (start, end) = window_bounds(idx, raw.len(), window.max(1));
            let total: f64 = (start..end).map(|j| (raw[j] - smoothed[j]).abs()).sum();
            total / (end - start) as f64
        })
        .collect()
}

fn window_bounds(idx: usize, len: usize, window: usize) -> (usize, usize) {
    let half = window / 2;
    let start = idx.saturating_sub(half);
    let end = (idx + half + 1).min(len);
    (start, end)
}

/// Pair distances with elevations, interpolating interior gaps.
fn fill_gaps(distances: &[f64], elevations: &[Option<f64>]) -> Vec<ElevationSample> {
    let values: Vec<Option<f64>> = (0..distances.len())
        .map(|idx| elevations.get(idx).copied().flatten().filter(|v| v.is_finite()))
        .collect();

    let valid: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.map(|_| idx))
        .collect();
    let (Some(&first), Some(&last)) = (valid.first(), valid.last()) else {
        return Vec::new();
    };

    let mut samples = Vec::with_capacity(last - first + 1);
    let mut prev = first;
    for idx in first..=last {
        let elevation_m = match values[idx] {
            Some(v) => {
                prev = idx;
                v
            }
            None => {
                let next = valid
                    .iter()
                    .copied()
                    .find(|&j| j > idx)
                    .unwrap_or(prev);
                interpolate_elevation(distances, &values, prev, next, idx)
            }
        };
        samples.push(ElevationSample {
            distance_km: distances[idx],
            elevation_m,
        });
    }
    samples
}

fn interpolate_elevation(
    distances: &[f64],
    values: &[Option<f64>],
    before: usize,
    after: usize,
    idx: usize,
) -> f64 {
    let v0 = values[before].unwrap_or_default();
    let v1 = values[after].unwrap_or(v0);
    let span = distances[after] - distances[before];
    if span <= f64::EPSILON {
        return v0;
    }
    let t = (distances[idx] - distances[before]) / span;
    v0 + (v1 - v0) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<LatLng> {
        (0..n)
            .map(|i| LatLng::new(45.0 + i as f64 * 0.001, 9.0))
            .collect()
    }

    #[test]
    fn downsample_keeps_short_geometry_whole() {
        assert_eq!(downsample_indices(5, 100), vec![0, 1, 2, 3, 4]);
        assert!(downsample_indices(0, 100).is_empty());
    }

    #[test]
    fn downsample_caps_samples_and_keeps_last_point() {
        let indices = downsample_indices(1000, 100);
        assert_eq!(indices.len(), 101);
        assert_eq!(indices[1], 10);
        assert_eq!(*indices.last().unwrap(), 999);

        let indices = downsample_indices(1001, 100);
        assert_eq!(indices[1], 11);
        assert_eq!(*indices.last().unwrap(), 1000);
        assert!(indices.len() <= 101);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn simple_scenario_applies_floor_and_cap() {
        let (gain, loss) = simple_gain_loss(&[100.0, 102.0, 101.0, 105.0, 103.0], 0.5, 3.0);
        assert_eq!(gain, 5.0);
        assert_eq!(loss, 3.0);
    }

    #[test]
    fn simple_ignores_noise_below_floor() {
        let (gain, loss) = simple_gain_loss(&[100.0, 100.3, 100.1, 100.4], 0.5, 10.0);
        assert_eq!((gain, loss), (0.0, 0.0));
    }

    #[test]
    fn simple_monotonic_series_have_one_sided_totals() {
        let rising: Vec<f64> = (0..50).map(|i| 200.0 + i as f64 * 1.7).collect();
        let (gain, loss) = simple_gain_loss(&rising, 0.5, 50.0);
        assert!(gain > 0.0);
        assert_eq!(loss, 0.0);

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let (gain, loss) = simple_gain_loss(&falling, 0.5, 50.0);
        assert_eq!(gain, 0.0);
        assert!(loss > 0.0);
    }

    #[test]
    fn hysteresis_suppresses_oscillation() {
        let noisy: Vec<f64> = (0..60)
            .map(|i| 500.0 + if i % 2 == 0 { 1.5 } else { -1.5 })
            .collect();
        let (gain, loss) = hysteresis_gain_loss(&noisy, 2.0, 150.0, 5, 1.0);
        assert_eq!((gain, loss), (0.0, 0.0));

        let (raw_gain, _) = simple_gain_loss(&noisy, 0.5, 150.0);
        assert!(raw_gain > 50.0);
    }

    #[test]
    fn hysteresis_keeps_sustained_climb() {
        let climb: Vec<f64> = (0..=100).map(|i| 300.0 + i as f64 * 3.0).collect();
        let (gain, loss) = hysteresis_gain_loss(&climb, 2.0, 150.0, 5, 1.0);
        assert_eq!(loss, 0.0);
        assert!(gain > 250.0 && gain <= 300.0, "gain {gain}");
    }

    #[test]
    fn moving_average_truncates_at_edges() {
        let smoothed = moving_average(&[0.0, 3.0, 6.0, 9.0], 3);
        assert_eq!(smoothed, vec![1.5, 3.0, 6.0, 7.5]);
        assert_eq!(moving_average(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn plan_needs_three_points() {
        let profiler = ElevationProfiler::default();
        assert!(profiler.plan(&line(2)).is_none());
        let request = profiler.plan(&line(3)).unwrap();
        assert_eq!(request.points.len(), 3);
        assert!(request.length_km > 0.2);
    }

    #[test]
    fn length_uses_full_resolution_geometry() {
        let profiler = ElevationProfiler::default();
        let geometry = line(1000);
        let request = profiler.plan(&geometry).unwrap();
        assert_eq!(request.points.len(), 101);
        assert!((request.length_km - path_length_km(&geometry)).abs() < 1e-12);
    }

    #[test]
    fn failed_interior_sample_is_interpolated_not_zeroed() {
        let profiler = ElevationProfiler::new(ProfileConfig {
            max_samples: 100,
            method: GainMethod::Simple {
                floor_m: 0.5,
                cap_m: 50.0,
            },
        });
        let request = profiler.plan(&line(3)).unwrap();
        let profile = profiler.profile(&request, &[Some(100.0), None, Some(110.0)]);

        assert_eq!(profile.samples.len(), 3);
        assert!((profile.samples[1].elevation_m - 105.0).abs() < 1e-6);
        assert_eq!(profile.min_m, Some(100.0));
        assert!((profile.gain_m.unwrap() - 10.0).abs() < 1e-6);
        assert_eq!(profile.loss_m, Some(0.0));
    }

    #[test]
    fn failed_edge_samples_are_dropped() {
        let profiler = ElevationProfiler::default();
        let request = profiler.plan(&line(5)).unwrap();
        let profile = profiler.profile(
            &request,
            &[None, Some(100.0), Some(f64::NAN), Some(104.0), None],
        );
        assert_eq!(profile.samples.len(), 3);
        assert!(profile.samples[0].distance_km > 0.0);
        assert!((profile.samples[1].elevation_m - 102.0).abs() < 1e-6);
    }

    #[test]
    fn total_failure_leaves_elevation_unknown() {
        let profiler = ElevationProfiler::default();
        let request = profiler.plan(&line(4)).unwrap();
        let profile = profiler.profile(&request, &[None, None, None, None]);
        assert!(profile.samples.is_empty());
        assert_eq!(profile.length_km, Some(request.length_km));
        assert_eq!(profile.gain_m, None);
        assert_eq!(profile.min_m, None);
    }

    #[test]
    fn profiling_is_deterministic() {
        let profiler = ElevationProfiler::default();
        let request = profiler.plan(&line(400)).unwrap();
        let elevations: Vec<Option<f64>> = (0..request.points.len())
            .map(|i| Some(400.0 + (i as f64 * 0.7).sin() * 25.0))
            .collect();
        let first = profiler.profile(&request, &elevations);
        let second = profiler.profile(&request, &elevations);
        assert_eq!(first, second);
    }

    #[test]
    fn gain_method_round_trips_through_serde() {
        let method = GainMethod::default_for_name("Simple").unwrap();
        let value = serde_json::to_value(method).unwrap();
        assert_eq!(value["method"], "simple");
        let back: GainMethod = serde_json::from_value(value).unwrap();
        assert_eq!(back, method);
        assert!(GainMethod::default_for_name("bogus").is_none());
        assert_eq!(method.with_cap(3.0), GainMethod::Simple { floor_m: 0.5, cap_m: 3.0 });
    }
}
