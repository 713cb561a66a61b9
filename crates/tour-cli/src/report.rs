//! Human-readable tour summary.

use std::fmt::Write;

use tour_server::TourSnapshot;

fn fmt_opt(value: Option<f64>, unit: &str, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$} {unit}"),
        None => "unknown".to_string(),
    }
}

/// Render a settled tour as plain text; `with_profile` adds one line per
/// elevation sample.
pub fn render_text(tour: &TourSnapshot, with_profile: bool) -> String {
    let mut out = String::new();
    let stats = &tour.stats;

    let _ = writeln!(out, "Waypoints:  {}", tour.waypoints.len());
    let _ = writeln!(
        out,
        "Geometry:   {} points{}",
        tour.geometry.len(),
        if tour.degraded { " (straight-line fallback)" } else { "" }
    );
    let _ = writeln!(out, "Length:     {}", fmt_opt(stats.length_km, "km", 1));
    let _ = writeln!(out, "Ascent:     {}", fmt_opt(stats.elevation_gain_m, "m", 0));
    let _ = writeln!(out, "Descent:    {}", fmt_opt(stats.elevation_loss_m, "m", 0));
    let _ = writeln!(out, "Lowest:     {}", fmt_opt(stats.min_elevation_m, "m", 0));
    let _ = writeln!(out, "Highest:    {}", fmt_opt(stats.max_elevation_m, "m", 0));

    if with_profile && !tour.profile.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:>10}  {:>9}", "km", "m");
        for sample in &tour.profile {
            let _ = writeln!(
                out,
                "{:>10.2}  {:>9.1}",
                sample.distance_km, sample.elevation_m
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tour_core::{ElevationSample, LatLng, Mode, SynthesisPhase, TrackStats};

    fn snapshot(stats: TrackStats, degraded: bool) -> TourSnapshot {
        TourSnapshot {
            waypoints: vec![LatLng::new(45.0, 9.0), LatLng::new(45.01, 9.0)],
            geometry: vec![LatLng::new(45.0, 9.0), LatLng::new(45.01, 9.0)],
            profile: vec![
                ElevationSample {
                    distance_km: 0.0,
                    elevation_m: 500.0,
                },
                ElevationSample {
                    distance_km: 1.11,
                    elevation_m: 600.0,
                },
            ],
            stats,
            mode: Mode::Automatic,
            phase: SynthesisPhase::Settled,
            generation: 2,
            degraded,
            until_index: Some(1),
            updated_at: Default::default(),
        }
    }

    #[test]
    fn unknown_stats_are_spelled_out() {
        let text = render_text(&snapshot(TrackStats::unknown(), false), false);
        assert!(text.contains("Length:     unknown"));
        assert!(!text.contains("fallback"));
        assert_eq!(text.lines().count(), 7);
    }

    #[test]
    fn renders_stats_and_profile() {
        let stats = TrackStats {
            length_km: Some(1.1),
            elevation_gain_m: Some(100.0),
            elevation_loss_m: Some(0.0),
            min_elevation_m: Some(500.0),
            max_elevation_m: Some(600.0),
        };
        let text = render_text(&snapshot(stats, true), true);
        assert!(text.contains("Length:     1.1 km"));
        assert!(text.contains("Ascent:     100 m"));
        assert!(text.contains("straight-line fallback"));
        assert!(text.contains("      1.11      600.0"));
    }
}
