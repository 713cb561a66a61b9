//! Incremental route synthesis.
//!
//! The synthesizer turns the waypoint list into displayable geometry while
//! reusing a frozen, already-routed prefix. It performs no I/O: it hands out
//! [`RoutingRequest`]s and expects the caller to feed the routing service's
//! answer back through [`RouteSynthesizer::apply_route`].
//!
//! Manual segments are retro-routed: waypoints drawn in manual mode stay past
//! the frozen prefix and become part of the next delta request once the mode
//! is automatic again and the waypoint list changes.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::models::{LatLng, Mode, SynthesisPhase, Waypoint};
use crate::sequencer::WaypointChange;
use crate::spatial::coincident;

/// Accepted geometry and the waypoint index it reaches.
///
/// `until_index` is the reported bookmark and drops by one for every removal
/// past it. `covered_index` is the waypoint the coords actually end at; it
/// only moves when new geometry is frozen, and invalidation is judged on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenRoute {
    coords: Vec<LatLng>,
    until_index: usize,
    covered_index: usize,
}

impl FrozenRoute {
    fn new(coords: Vec<LatLng>, index: usize) -> Self {
        Self {
            coords,
            until_index: index,
            covered_index: index,
        }
    }

    pub fn coords(&self) -> &[LatLng] {
        &self.coords
    }

    pub fn until_index(&self) -> usize {
        self.until_index
    }

    pub fn covered_index(&self) -> usize {
        self.covered_index
    }

    fn anchor(&self) -> Option<LatLng> {
        self.coords.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingKind {
    /// Route every waypoint from scratch
    Full,
    /// Route from the frozen anchor through the new waypoints only
    Delta,
}

/// A request for the routing service, stamped with the state it was cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub generation: u64,
    pub kind: RoutingKind,
    pub points: Vec<LatLng>,
    /// Waypoint index the frozen route will reach once this request lands.
    pub until_index: usize,
    /// Length of the frozen coords the delta extends (0 for full requests).
    pub base_len: usize,
}

/// What the caller should do after [`RouteSynthesizer::synthesize`].
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisStep {
    /// Geometry is already what is displayed.
    Unchanged,
    /// Fewer than two waypoints: drop geometry, profile and stats.
    Clear,
    /// Display this geometry.
    Draw(Vec<LatLng>),
    /// Ask the routing service; keep the current display meanwhile.
    Route(RoutingRequest),
}

/// Result of feeding a routing answer back.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// A newer mutation superseded the request; nothing changed.
    Stale,
    /// Routing succeeded and the frozen route was extended or replaced.
    Settled(Vec<LatLng>),
    /// Routing failed; straight lines stand in for the missing part.
    Degraded {
        geometry: Vec<LatLng>,
        reason: String,
    },
}

/// All mutable synthesis state, owned by a single controller.
#[derive(Debug, Clone, Default)]
pub struct RouteSynthesizer {
    frozen: Option<FrozenRoute>,
    mode: Mode,
    phase: SynthesisPhase,
    geometry: Vec<LatLng>,
    degraded: bool,
    /// Straight manual segments are displayed past the frozen prefix.
    unrouted: bool,
}

impl RouteSynthesizer {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> SynthesisPhase {
        self.phase
    }

    pub fn frozen(&self) -> Option<&FrozenRoute> {
        self.frozen.as_ref()
    }

    /// Geometry last handed out for display.
    pub fn geometry(&self) -> &[LatLng] {
        &self.geometry
    }

    /// True when part of the displayed geometry is a straight-line stand-in
    /// for a failed routing request.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Switch between automatic and manual drawing.
    ///
    /// Never issues a request by itself: frozen geometry is kept as is, and
    /// pending manual waypoints wait for the next waypoint change, so the
    /// phase stays `ManualDrawing` until they are routed.
    /// Returns false when the mode was already set.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        self.phase = match (self.phase, mode) {
            (SynthesisPhase::Idle, _) => SynthesisPhase::Idle,
            (SynthesisPhase::RoutingInFlight, _) => SynthesisPhase::RoutingInFlight,
            (_, Mode::Manual) => SynthesisPhase::ManualDrawing,
            (_, Mode::Automatic) if self.unrouted => SynthesisPhase::ManualDrawing,
            (_, Mode::Automatic) => SynthesisPhase::Settled,
        };
        true
    }

    /// Update the frozen route for a waypoint mutation, before re-synthesis.
    pub fn note_change(&mut self, change: WaypointChange) {
        let Some(frozen) = self.frozen.take() else {
            return;
        };
        self.frozen = match change {
            WaypointChange::Appended | WaypointChange::LoopClosed => Some(frozen),
            WaypointChange::Cleared => None,
            WaypointChange::Removed { index } if index <= frozen.covered_index => None,
            WaypointChange::Removed { .. } => Some(FrozenRoute {
                until_index: frozen.until_index.saturating_sub(1),
                ..frozen
            }),
            WaypointChange::Inserted { index } if index <= frozen.covered_index => None,
            WaypointChange::Swapped { upper } if upper <= frozen.covered_index => None,
            WaypointChange::Inserted { .. } | WaypointChange::Swapped { .. } => Some(frozen),
        };
    }

    /// Work out what to display for `waypoints`, possibly asking for a route.
    pub fn synthesize(&mut self, waypoints: &[Waypoint], generation: u64) -> SynthesisStep {
        if waypoints.len() < 2 {
            self.reset();
            return SynthesisStep::Clear;
        }

        if self
            .frozen
            .as_ref()
            .is_some_and(|frozen| frozen.covered_index >= waypoints.len() || frozen.coords.is_empty())
        {
            self.frozen = None;
        }

        if self.mode == Mode::Manual {
            self.phase = SynthesisPhase::ManualDrawing;
            self.degraded = false;
            self.unrouted = self
                .frozen
                .as_ref()
                .map_or(true, |frozen| !pending_tail(frozen, waypoints).is_empty());
            let geometry = self.straight_geometry(waypoints);
            return self.draw(geometry);
        }

        let last_index = waypoints.len() - 1;
        let Some(frozen) = self.frozen.as_ref() else {
            self.phase = SynthesisPhase::RoutingInFlight;
            return SynthesisStep::Route(RoutingRequest {
                generation,
                kind: RoutingKind::Full,
                points: waypoints.to_vec(),
                until_index: last_index,
                base_len: 0,
            });
        };

        let tail = pending_tail(frozen, waypoints);
        if tail.is_empty() {
            let coords = frozen.coords.clone();
            self.frozen = Some(FrozenRoute::new(coords.clone(), last_index));
            self.phase = SynthesisPhase::Settled;
            self.degraded = false;
            self.unrouted = false;
            return self.draw(coords);
        }

        let mut points = Vec::with_capacity(tail.len() + 1);
        points.extend(frozen.anchor());
        points.extend_from_slice(tail);
        self.phase = SynthesisPhase::RoutingInFlight;
        SynthesisStep::Route(RoutingRequest {
            generation,
            kind: RoutingKind::Delta,
            points,
            until_index: last_index,
            base_len: frozen.coords.len(),
        })
    }

    /// Apply the routing service's answer to `request`.
    ///
    /// `waypoints` and `generation` describe the list as it is now; a request
    /// cut from an older generation is dropped without touching any state.
    pub fn apply_route<E: Display>(
        &mut self,
        request: &RoutingRequest,
        result: Result<Vec<LatLng>, E>,
        waypoints: &[Waypoint],
        generation: u64,
    ) -> RouteOutcome {
        if request.generation != generation || waypoints.len() < 2 {
            return RouteOutcome::Stale;
        }
        let base_matches = match (request.kind, self.frozen.as_ref()) {
            (RoutingKind::Full, None) => true,
            (RoutingKind::Delta, Some(frozen)) => frozen.coords.len() == request.base_len,
            _ => false,
        };
        if !base_matches {
            return RouteOutcome::Stale;
        }

        let routed = match result {
            Ok(coords) if coords.len() >= 2 => Ok(coords),
            Ok(_) => Err("routing service returned an empty route".to_string()),
            Err(err) => Err(err.to_string()),
        };

        self.phase = match self.mode {
            Mode::Automatic => SynthesisPhase::Settled,
            Mode::Manual => SynthesisPhase::ManualDrawing,
        };
        self.unrouted = false;

        match routed {
            Ok(coords) => {
                let coords = match self.frozen.take() {
                    Some(frozen) => {
                        let mut combined = frozen.coords;
                        combined.extend(coords.into_iter().skip(1));
                        combined
                    }
                    None => coords,
                };
                self.frozen = Some(FrozenRoute::new(coords, request.until_index));
                self.degraded = false;
                let geometry = self.straight_geometry(waypoints);
                self.geometry = geometry.clone();
                RouteOutcome::Settled(geometry)
            }
            Err(reason) => {
                self.degraded = true;
                let geometry = self.straight_geometry(waypoints);
                self.geometry = geometry.clone();
                RouteOutcome::Degraded { geometry, reason }
            }
        }
    }

    /// Forget everything, as when the tour drops below two waypoints.
    pub fn reset(&mut self) {
        self.frozen = None;
        self.geometry.clear();
        self.degraded = false;
        self.unrouted = false;
        self.phase = SynthesisPhase::Idle;
    }

    /// Frozen coords followed by straight segments through every waypoint
    /// past the frozen prefix (or through all waypoints without one).
    fn straight_geometry(&self, waypoints: &[Waypoint]) -> Vec<LatLng> {
        match self.frozen.as_ref() {
            Some(frozen) => {
                let tail = pending_tail(frozen, waypoints);
                let mut geometry = Vec::with_capacity(frozen.coords.len() + tail.len());
                geometry.extend_from_slice(&frozen.coords);
                geometry.extend_from_slice(tail);
                geometry
            }
            None => waypoints.to_vec(),
        }
    }

    fn draw(&mut self, geometry: Vec<LatLng>) -> SynthesisStep {
        if geometry == self.geometry {
            return SynthesisStep::Unchanged;
        }
        self.geometry = geometry.clone();
        SynthesisStep::Draw(geometry)
    }
}

/// Waypoints past the frozen prefix, skipping any that sit on the anchor.
fn pending_tail<'a>(frozen: &FrozenRoute, waypoints: &'a [Waypoint]) -> &'a [Waypoint] {
    let start = (frozen.covered_index + 1).min(waypoints.len());
    let mut tail = &waypoints[start..];
    if let Some(anchor) = frozen.anchor() {
        while let Some((first, rest)) = tail.split_first() {
            if !coincident(*first, anchor) {
                break;
            }
            tail = rest;
        }
    }
    tail
}
