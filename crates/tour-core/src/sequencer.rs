//! Ordered, mutable list of user waypoints.
//!
//! Every accepted mutation bumps the generation counter and reports a
//! [`WaypointChange`] so the route synthesizer can decide how much of the
//! settled geometry survives.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{LatLng, Waypoint};
use crate::spatial::{haversine_distance, midpoint};

/// Default radius for the click-to-close heuristic.
pub const DEFAULT_LOOP_CLOSE_RADIUS_M: f64 = 50.0;

/// A rejected waypoint operation. The list is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaypointError {
    #[error("index {index} out of range for {len} waypoints")]
    OutOfRange { index: usize, len: usize },
    #[error("cannot insert after the last waypoint")]
    InsertAfterLast,
    #[error("cannot move past the end of the list")]
    AtBoundary,
    #[error("need at least 2 waypoints to close a loop")]
    TooFewToClose,
    #[error("already closed")]
    AlreadyClosed,
    #[error("no waypoints to undo")]
    Empty,
    #[error("coordinates must be finite")]
    NonFinite,
}

/// What an accepted mutation did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaypointChange {
    Appended,
    /// A new waypoint now lives at `index`.
    Inserted { index: usize },
    /// The waypoint formerly at `index` is gone.
    Removed { index: usize },
    /// Waypoints at `upper` and `upper + 1` traded places.
    Swapped { upper: usize },
    LoopClosed,
    Cleared,
}

/// Owns the waypoint list and its generation counter.
#[derive(Debug, Clone, Default)]
pub struct WaypointSequence {
    points: Vec<Waypoint>,
    generation: u64,
}

impl WaypointSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Waypoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Current generation. Starts at zero and only ever grows.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A tour is closed when its first and last waypoints are identical.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => self.points.len() >= 2 && first == last,
            _ => false,
        }
    }

    pub fn append(&mut self, point: Waypoint) -> Result<WaypointChange, WaypointError> {
        if !point.is_finite() {
            return Err(WaypointError::NonFinite);
        }
        self.points.push(point);
        Ok(self.bump(WaypointChange::Appended))
    }

    /// Insert the midpoint of waypoints `index` and `index + 1`.
    pub fn insert_after(&mut self, index: usize) -> Result<WaypointChange, WaypointError> {
        if index.saturating_add(1) >= self.points.len() {
            return Err(WaypointError::InsertAfterLast);
        }
        let mid = midpoint(self.points[index], self.points[index + 1]);
        self.points.insert(index + 1, mid);
        Ok(self.bump(WaypointChange::Inserted { index: index + 1 }))
    }

    pub fn remove(&mut self, index: usize) -> Result<WaypointChange, WaypointError> {
        if index >= self.points.len() {
            return Err(WaypointError::OutOfRange {
                index,
                len: self.points.len(),
            });
        }
        self.points.remove(index);
        Ok(self.bump(WaypointChange::Removed { index }))
    }

    pub fn move_up(&mut self, index: usize) -> Result<WaypointChange, WaypointError> {
        if index >= self.points.len() {
            return Err(WaypointError::OutOfRange {
                index,
                len: self.points.len(),
            });
        }
        if index == 0 {
            return Err(WaypointError::AtBoundary);
        }
        self.points.swap(index - 1, index);
        Ok(self.bump(WaypointChange::Swapped { upper: index - 1 }))
    }

    pub fn move_down(&mut self, index: usize) -> Result<WaypointChange, WaypointError> {
        if index >= self.points.len() {
            return Err(WaypointError::OutOfRange {
                index,
                len: self.points.len(),
            });
        }
        if index + 1 == self.points.len() {
            return Err(WaypointError::AtBoundary);
        }
        self.points.swap(index, index + 1);
        Ok(self.bump(WaypointChange::Swapped { upper: index }))
    }

    /// Remove the most recently placed waypoint.
    pub fn undo_last(&mut self) -> Result<WaypointChange, WaypointError> {
        if self.points.is_empty() {
            return Err(WaypointError::Empty);
        }
        let index = self.points.len() - 1;
        self.points.pop();
        Ok(self.bump(WaypointChange::Removed { index }))
    }

    /// Append a copy of the first waypoint.
    pub fn close_loop(&mut self) -> Result<WaypointChange, WaypointError> {
        if self.points.len() < 2 {
            return Err(WaypointError::TooFewToClose);
        }
        if self.is_closed() {
            return Err(WaypointError::AlreadyClosed);
        }
        let first = self.points[0];
        self.points.push(first);
        Ok(self.bump(WaypointChange::LoopClosed))
    }

    pub fn clear(&mut self) -> Result<WaypointChange, WaypointError> {
        if self.points.is_empty() {
            return Err(WaypointError::Empty);
        }
        self.points.clear();
        Ok(self.bump(WaypointChange::Cleared))
    }

    /// Click-to-close heuristic: a click near the start of an open tour is
    /// probably meant to close it rather than add a stray point.
    pub fn suggests_loop_close(&self, point: LatLng, radius_m: f64) -> bool {
        if self.points.len() < 2 || self.is_closed() {
            return false;
        }
        let first = self.points[0];
        haversine_distance(first.lat, first.lon, point.lat, point.lon) <= radius_m
    }

    fn bump(&mut self, change: WaypointChange) -> WaypointChange {
        self.generation += 1;
        change
    }
}
