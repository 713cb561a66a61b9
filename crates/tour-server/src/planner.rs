//! Single-owner planner task.
//!
//! One tokio task owns the waypoint sequence, the route synthesizer and the
//! latest profile/stats. Callers talk to it through a [`PlannerHandle`];
//! routing and elevation work runs on spawned tasks that post their results
//! back to the loop, where they are gated on the generation they were cut
//! from. Elevation jobs also carry a ticket so only the latest one lands.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tour_core::{
    aggregate, ElevationProfile, ElevationProfiler, ElevationSample, LatLng, Mode,
    ProfileConfig, ProfileRequest, RouteOutcome, RouteSynthesizer, RoutingRequest,
    SynthesisPhase, SynthesisStep, TourEvent, TrackStats, Waypoint, WaypointChange,
    WaypointError, WaypointSequence, DEFAULT_LOOP_CLOSE_RADIUS_M,
};

use crate::providers::{ElevationError, ElevationProvider, RouteProvider, RoutingError};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOptions {
    pub mode: Mode,
    pub routing_profile: String,
    pub loop_close_radius_m: f64,
    pub profile: ProfileConfig,
    pub event_buffer: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Automatic,
            routing_profile: "foot".to_string(),
            loop_close_radius_m: DEFAULT_LOOP_CLOSE_RADIUS_M,
            profile: ProfileConfig::default(),
            event_buffer: 256,
        }
    }
}

/// Caller-facing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TourCommand {
    /// Append a waypoint. Unless `force` is set, a point close to the start
    /// of an open tour is answered with [`CommandOutcome::CloseLoopOffered`].
    Append { point: LatLng, force: bool },
    InsertAfter { index: usize },
    Remove { index: usize },
    MoveUp { index: usize },
    MoveDown { index: usize },
    UndoLast,
    CloseLoop,
    Clear,
    SetMode(Mode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied { generation: u64 },
    CloseLoopOffered,
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner task is not running")]
    Closed,
    #[error(transparent)]
    Rejected(#[from] WaypointError),
}

/// Read model of the whole tour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourSnapshot {
    pub waypoints: Vec<Waypoint>,
    pub geometry: Vec<LatLng>,
    pub profile: Vec<ElevationSample>,
    pub stats: TrackStats,
    pub mode: Mode,
    pub phase: SynthesisPhase,
    pub generation: u64,
    pub degraded: bool,
    pub until_index: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

enum PlannerMessage {
    Command {
        command: TourCommand,
        reply: oneshot::Sender<Result<CommandOutcome, PlannerError>>,
    },
    Snapshot {
        reply: oneshot::Sender<TourSnapshot>,
    },
    Settled {
        reply: oneshot::Sender<TourSnapshot>,
    },
}

impl std::fmt::Debug for PlannerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerMessage::Command { command, .. } => write!(f, "Command({command:?})"),
            PlannerMessage::Snapshot { .. } => f.write_str("Snapshot"),
            PlannerMessage::Settled { .. } => f.write_str("Settled"),
        }
    }
}

enum TaskResult {
    RouteResolved {
        request: RoutingRequest,
        result: Result<Vec<LatLng>, RoutingError>,
    },
    ProfileResolved {
        ticket: u64,
        generation: u64,
        request: ProfileRequest,
        result: Result<Vec<Option<f64>>, ElevationError>,
    },
}

/// Cloneable handle to a running planner.
#[derive(Debug, Clone)]
pub struct PlannerHandle {
    tx: mpsc::Sender<PlannerMessage>,
    events: broadcast::Sender<TourEvent>,
}

impl PlannerHandle {
    pub async fn execute(&self, command: TourCommand) -> Result<CommandOutcome, PlannerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlannerMessage::Command { command, reply })
            .await
            .map_err(|_| PlannerError::Closed)?;
        rx.await.map_err(|_| PlannerError::Closed)?
    }

    pub async fn append(&self, point: LatLng) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::Append { point, force: false }).await
    }

    pub async fn insert_after(&self, index: usize) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::InsertAfter { index }).await
    }

    pub async fn remove(&self, index: usize) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::Remove { index }).await
    }

    pub async fn move_up(&self, index: usize) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::MoveUp { index }).await
    }

    pub async fn move_down(&self, index: usize) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::MoveDown { index }).await
    }

    pub async fn undo_last(&self) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::UndoLast).await
    }

    pub async fn close_loop(&self) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::CloseLoop).await
    }

    pub async fn clear(&self) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::Clear).await
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<CommandOutcome, PlannerError> {
        self.execute(TourCommand::SetMode(mode)).await
    }

    /// Current state, without waiting for in-flight work.
    pub async fn snapshot(&self) -> Result<TourSnapshot, PlannerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlannerMessage::Snapshot { reply })
            .await
            .map_err(|_| PlannerError::Closed)?;
        rx.await.map_err(|_| PlannerError::Closed)
    }

    /// Resolves once no routing or elevation work is in flight.
    pub async fn settled(&self) -> Result<TourSnapshot, PlannerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlannerMessage::Settled { reply })
            .await
            .map_err(|_| PlannerError::Closed)?;
        rx.await.map_err(|_| PlannerError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TourEvent> {
        self.events.subscribe()
    }
}

/// Start the planner task on the current runtime.
pub fn spawn_planner<R, E>(router: R, elevation: E, options: PlannerOptions) -> PlannerHandle
where
    R: RouteProvider,
    E: ElevationProvider,
{
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (events, _) = broadcast::channel(options.event_buffer.max(1));
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let planner = Planner::new(
        Arc::new(router),
        Arc::new(elevation),
        options,
        events.clone(),
        results_tx,
    );
    tokio::spawn(run_planner_loop(planner, rx, results_rx));
    PlannerHandle { tx, events }
}

async fn run_planner_loop<R, E>(
    mut planner: Planner<R, E>,
    mut commands: mpsc::Receiver<PlannerMessage>,
    mut results: mpsc::UnboundedReceiver<TaskResult>,
) where
    R: RouteProvider,
    E: ElevationProvider,
{
    tracing::info!("Planner loop started");

    loop {
        tokio::select! {
            message = commands.recv() => {
                match message {
                    Some(message) => planner.handle_message(message),
                    None => {
                        tracing::info!("Planner command channel closed");
                        break;
                    }
                }
            }
            Some(result) = results.recv() => planner.handle_result(result),
        }
        planner.notify_settled();
    }

    planner.cancel_routing();
    planner.cancel_profile();
}

struct InFlight {
    key: u64,
    handle: JoinHandle<()>,
}

struct Planner<R, E> {
    router: Arc<R>,
    elevation: Arc<E>,
    options: PlannerOptions,
    sequence: WaypointSequence,
    synthesizer: RouteSynthesizer,
    profiler: ElevationProfiler,
    profile: Vec<ElevationSample>,
    stats: TrackStats,
    /// Something other than the empty tour is currently displayed.
    shown: bool,
    events: broadcast::Sender<TourEvent>,
    results: mpsc::UnboundedSender<TaskResult>,
    routing: Option<InFlight>,
    profiling: Option<InFlight>,
    /// Generation the latest profile job was issued for.
    profile_generation: u64,
    profile_ticket: u64,
    settle_waiters: Vec<oneshot::Sender<TourSnapshot>>,
    updated_at: DateTime<Utc>,
}

impl<R, E> Planner<R, E>
where
    R: RouteProvider,
    E: ElevationProvider,
{
    fn new(
        router: Arc<R>,
        elevation: Arc<E>,
        options: PlannerOptions,
        events: broadcast::Sender<TourEvent>,
        results: mpsc::UnboundedSender<TaskResult>,
    ) -> Self {
        Self {
            router,
            elevation,
            synthesizer: RouteSynthesizer::new(options.mode),
            profiler: ElevationProfiler::new(options.profile),
            options,
            sequence: WaypointSequence::new(),
            profile: Vec::new(),
            stats: TrackStats::unknown(),
            shown: false,
            events,
            results,
            routing: None,
            profiling: None,
            profile_generation: 0,
            profile_ticket: 0,
            settle_waiters: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    fn handle_message(&mut self, message: PlannerMessage) {
        match message {
            PlannerMessage::Command { command, reply } => {
                let outcome = self.handle_command(command);
                if let Err(err) = &outcome {
                    tracing::debug!("Waypoint operation rejected: {}", err);
                }
                let _ = reply.send(outcome);
            }
            PlannerMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            PlannerMessage::Settled { reply } => self.settle_waiters.push(reply),
        }
    }

    fn handle_command(&mut self, command: TourCommand) -> Result<CommandOutcome, PlannerError> {
        let change = match command {
            TourCommand::Append { point, force } => {
                if !force
                    && self
                        .sequence
                        .suggests_loop_close(point, self.options.loop_close_radius_m)
                {
                    return Ok(CommandOutcome::CloseLoopOffered);
                }
                self.sequence.append(point)?
            }
            TourCommand::InsertAfter { index } => self.sequence.insert_after(index)?,
            TourCommand::Remove { index } => self.sequence.remove(index)?,
            TourCommand::MoveUp { index } => self.sequence.move_up(index)?,
            TourCommand::MoveDown { index } => self.sequence.move_down(index)?,
            TourCommand::UndoLast => self.sequence.undo_last()?,
            TourCommand::CloseLoop => self.sequence.close_loop()?,
            TourCommand::Clear => self.sequence.clear()?,
            TourCommand::SetMode(mode) => {
                if self.synthesizer.set_mode(mode) {
                    tracing::info!("Drawing mode set to {:?}", mode);
                    self.touch();
                }
                return Ok(CommandOutcome::Applied {
                    generation: self.sequence.generation(),
                });
            }
        };

        self.apply_change(change);
        Ok(CommandOutcome::Applied {
            generation: self.sequence.generation(),
        })
    }

    fn apply_change(&mut self, change: WaypointChange) {
        self.cancel_routing();
        self.touch();
        self.synthesizer.note_change(change);

        let generation = self.sequence.generation();
        match self.synthesizer.synthesize(self.sequence.points(), generation) {
            SynthesisStep::Unchanged => self.reissue_profile(generation),
            SynthesisStep::Clear => self.clear_outputs(generation),
            SynthesisStep::Draw(geometry) => self.publish_geometry(geometry, generation),
            SynthesisStep::Route(request) => {
                // The profile for the old geometry would land after the
                // generation moved on.
                self.cancel_profile();
                self.profile_ticket += 1;
                self.start_routing(request);
            }
        }
    }

    /// Same geometry, newer generation: an elevation job still in flight is
    /// restarted so its result is stamped with the current generation.
    fn reissue_profile(&mut self, generation: u64) {
        if self.profiling.is_none() {
            return;
        }
        let geometry = self.synthesizer.geometry().to_vec();
        self.start_profile(&geometry, generation);
    }

    fn start_routing(&mut self, request: RoutingRequest) {
        tracing::debug!(
            "Requesting {:?} route through {} points (generation {})",
            request.kind,
            request.points.len(),
            request.generation
        );

        let key = request.generation;
        let router = self.router.clone();
        let profile = self.options.routing_profile.clone();
        let results = self.results.clone();
        let handle = tokio::spawn(async move {
            let result = router.route(&request.points, &profile).await;
            let _ = results.send(TaskResult::RouteResolved { request, result });
        });
        self.routing = Some(InFlight { key, handle });
    }

    fn handle_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::RouteResolved { request, result } => self.on_route(request, result),
            TaskResult::ProfileResolved {
                ticket,
                generation,
                request,
                result,
            } => self.on_profile(ticket, generation, request, result),
        }
    }

    fn on_route(&mut self, request: RoutingRequest, result: Result<Vec<LatLng>, RoutingError>) {
        if self
            .routing
            .as_ref()
            .is_some_and(|task| task.key == request.generation)
        {
            self.routing = None;
        }

        let generation = self.sequence.generation();
        match self
            .synthesizer
            .apply_route(&request, result, self.sequence.points(), generation)
        {
            RouteOutcome::Stale => {
                tracing::debug!(
                    "Discarding route for generation {} (current {})",
                    request.generation,
                    generation
                );
            }
            RouteOutcome::Settled(geometry) => {
                self.touch();
                self.publish_geometry(geometry, generation);
            }
            RouteOutcome::Degraded { geometry, reason } => {
                tracing::warn!(
                    "Routing failed for generation {}, drawing straight segments: {}",
                    generation,
                    reason
                );
                self.touch();
                self.emit(TourEvent::RoutingFailed { generation, reason });
                self.publish_geometry(geometry, generation);
            }
        }
    }

    fn publish_geometry(&mut self, geometry: Vec<LatLng>, generation: u64) {
        self.shown = true;
        self.emit(TourEvent::GeometryChanged {
            generation,
            points: geometry.clone(),
        });
        self.start_profile(&geometry, generation);
    }

    fn start_profile(&mut self, geometry: &[LatLng], generation: u64) {
        self.cancel_profile();
        self.profile_ticket += 1;
        self.profile_generation = generation;

        let Some(request) = self.profiler.plan(geometry) else {
            self.set_profile(ElevationProfile::default());
            return;
        };

        let ticket = self.profile_ticket;
        let elevation = self.elevation.clone();
        let results = self.results.clone();
        let handle = tokio::spawn(async move {
            let result = elevation.elevations(&request.points).await;
            let _ = results.send(TaskResult::ProfileResolved {
                ticket,
                generation,
                request,
                result,
            });
        });
        self.profiling = Some(InFlight {
            key: ticket,
            handle,
        });
    }

    fn on_profile(
        &mut self,
        ticket: u64,
        generation: u64,
        request: ProfileRequest,
        result: Result<Vec<Option<f64>>, ElevationError>,
    ) {
        if self
            .profiling
            .as_ref()
            .is_some_and(|task| task.key == ticket)
        {
            self.profiling = None;
        }

        let current = self.sequence.generation();
        if ticket != self.profile_ticket || generation != current {
            tracing::debug!(
                "Discarding elevation profile for generation {} (current {})",
                generation,
                current
            );
            return;
        }

        let profile = match result {
            Ok(elevations) if elevations.len() == request.points.len() => {
                self.profiler.profile(&request, &elevations)
            }
            Ok(elevations) => {
                tracing::warn!(
                    "Elevation service returned {} samples for {} points",
                    elevations.len(),
                    request.points.len()
                );
                ElevationProfile::length_only(request.length_km)
            }
            Err(err) => {
                tracing::warn!("Elevation lookup failed: {}", err);
                ElevationProfile::length_only(request.length_km)
            }
        };
        self.touch();
        self.set_profile(profile);
    }

    fn set_profile(&mut self, profile: ElevationProfile) {
        let stats = aggregate(&profile);
        let generation = self.profile_generation;
        if profile.samples != self.profile {
            self.profile = profile.samples;
            self.emit(TourEvent::ProfileChanged {
                generation,
                samples: self.profile.clone(),
            });
        }
        if stats != self.stats {
            self.stats = stats;
            self.emit(TourEvent::StatsChanged { generation, stats });
        }
    }

    fn clear_outputs(&mut self, generation: u64) {
        self.cancel_profile();
        self.profile_ticket += 1;
        if !self.shown {
            return;
        }
        self.shown = false;
        self.profile.clear();
        self.stats = TrackStats::unknown();
        self.emit(TourEvent::GeometryChanged {
            generation,
            points: Vec::new(),
        });
        self.emit(TourEvent::ProfileChanged {
            generation,
            samples: Vec::new(),
        });
        self.emit(TourEvent::StatsChanged {
            generation,
            stats: self.stats,
        });
    }

    fn cancel_routing(&mut self) {
        if let Some(task) = self.routing.take() {
            task.handle.abort();
        }
    }

    fn cancel_profile(&mut self) {
        if let Some(task) = self.profiling.take() {
            task.handle.abort();
        }
    }

    fn emit(&self, event: TourEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn is_idle(&self) -> bool {
        self.routing.is_none() && self.profiling.is_none()
    }

    fn notify_settled(&mut self) {
        if self.settle_waiters.is_empty() || !self.is_idle() {
            return;
        }
        let snapshot = self.snapshot();
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(snapshot.clone());
        }
    }

    fn snapshot(&self) -> TourSnapshot {
        TourSnapshot {
            waypoints: self.sequence.points().to_vec(),
            geometry: self.synthesizer.geometry().to_vec(),
            profile: self.profile.clone(),
            stats: self.stats,
            mode: self.synthesizer.mode(),
            phase: self.synthesizer.phase(),
            generation: self.sequence.generation(),
            degraded: self.synthesizer.is_degraded(),
            until_index: self.synthesizer.frozen().map(|frozen| frozen.until_index()),
            updated_at: self.updated_at,
        }
    }
}
