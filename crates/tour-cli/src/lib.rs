//! Tour CLI - plan a tour from the command line.
//!
//! The `plan_tour` binary drives the planner in-process against the
//! configured routing and elevation services and prints the result.

pub mod input;
pub mod report;

pub use input::{parse_point, parse_waypoints, InputError};
pub use report::render_text;
