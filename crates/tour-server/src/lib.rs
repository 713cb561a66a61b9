//! Tour planner service: collaborators, planner task and HTTP surface.

pub mod api;
pub mod cache;
pub mod config;
pub mod planner;
pub mod providers;
pub mod state;

pub use planner::{
    spawn_planner, CommandOutcome, PlannerError, PlannerHandle, PlannerOptions, TourCommand,
    TourSnapshot,
};
