//! Coordinate-keyed elevation cache.
//!
//! Elevation at a fixed spot never changes, so repeated profiles of a growing
//! tour only need to look up the samples that moved.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tour_core::LatLng;

/// Coordinates are keyed at 1e-5 degrees (about a meter).
const KEY_SCALE: f64 = 100_000.0;

type CacheKey = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct ElevationEntry {
    fetched_at: Instant,
    elevation_m: f64,
}

#[derive(Debug)]
pub struct ElevationCache {
    entries: DashMap<CacheKey, ElevationEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl ElevationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached elevation for `point`, if present and fresh.
    pub fn get(&self, point: LatLng) -> Option<f64> {
        let entry = self.entries.get(&cache_key(point))?;
        if entry.fetched_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.elevation_m)
    }

    pub fn insert(&self, point: LatLng, elevation_m: f64) {
        if !elevation_m.is_finite() {
            return;
        }
        self.entries.insert(
            cache_key(point),
            ElevationEntry {
                fetched_at: Instant::now(),
                elevation_m,
            },
        );
    }

    /// Drop expired entries, then the oldest ones until under the size cap.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut entries: Vec<(CacheKey, Instant)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().fetched_at))
            .collect();

        for (key, fetched_at) in &entries {
            if now.duration_since(*fetched_at) > self.ttl {
                self.entries.remove(key);
            }
        }

        if self.entries.len() <= self.max_entries {
            return;
        }

        entries.sort_by_key(|(_, fetched_at)| *fetched_at);
        for (key, _) in entries {
            if self.entries.len() <= self.max_entries {
                break;
            }
            self.entries.remove(&key);
        }
    }
}

fn cache_key(point: LatLng) -> CacheKey {
    (
        (point.lat * KEY_SCALE).round() as i64,
        (point.lon * KEY_SCALE).round() as i64,
    )
}
