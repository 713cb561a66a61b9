//! Shared application state for the HTTP layer.

use crate::planner::PlannerHandle;

pub struct AppState {
    planner: PlannerHandle,
}

impl AppState {
    pub fn new(planner: PlannerHandle) -> Self {
        Self { planner }
    }

    pub fn planner(&self) -> &PlannerHandle {
        &self.planner
    }
}
