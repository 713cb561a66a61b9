pub mod models;
pub mod profile;
pub mod sequencer;
pub mod spatial;
pub mod stats;
pub mod synthesizer;

pub use models::{
    ElevationSample, LatLng, Mode, SynthesisPhase, TourEvent, TrackStats, Waypoint,
};
pub use profile::{
    downsample_indices, gain_loss, ElevationProfile, ElevationProfiler, GainMethod, ProfileConfig,
    ProfileRequest,
};
pub use sequencer::{WaypointChange, WaypointError, WaypointSequence, DEFAULT_LOOP_CLOSE_RADIUS_M};
pub use spatial::haversine_distance;
pub use stats::aggregate;
pub use synthesizer::{
    FrozenRoute, RouteOutcome, RouteSynthesizer, RoutingKind, RoutingRequest, SynthesisStep,
};
