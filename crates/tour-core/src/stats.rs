//! Track statistics snapshot.

use crate::models::TrackStats;
use crate::profile::ElevationProfile;

/// Fold a profile into the snapshot consumers see.
///
/// Elevation figures are rounded to whole meters and length to 0.1 km. The
/// result always replaces the previous snapshot as a whole.
pub fn aggregate(profile: &ElevationProfile) -> TrackStats {
    TrackStats {
        length_km: profile.length_km.map(round_tenth),
        elevation_gain_m: profile.gain_m.map(f64::round),
        elevation_loss_m: profile.loss_m.map(f64::round),
        min_elevation_m: profile.min_m.map(f64::round),
        max_elevation_m: profile.max_m.map(f64::round),
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_each_field() {
        let profile = ElevationProfile {
            samples: Vec::new(),
            length_km: Some(12.345),
            gain_m: Some(431.6),
            loss_m: Some(429.2),
            min_m: Some(201.49),
            max_m: Some(633.5),
        };
        let stats = aggregate(&profile);
        assert_eq!(stats.length_km, Some(12.3));
        assert_eq!(stats.elevation_gain_m, Some(432.0));
        assert_eq!(stats.elevation_loss_m, Some(429.0));
        assert_eq!(stats.min_elevation_m, Some(201.0));
        assert_eq!(stats.max_elevation_m, Some(634.0));
    }

    #[test]
    fn unknown_profile_gives_unknown_stats() {
        assert!(aggregate(&ElevationProfile::default()).is_unknown());

        let stats = aggregate(&ElevationProfile::length_only(3.06));
        assert_eq!(stats.length_km, Some(3.1));
        assert_eq!(stats.elevation_gain_m, None);
    }
}
