use std::time::Duration;

use tracing::{debug, info, warn};

use crate::state::RunState;

/// Observer hooks around a run and each of its steps.
///
/// Interceptors see the state read-only and cannot alter control flow.
pub trait StepInterceptor: Send + Sync {
    fn run_started(&self, _state: &RunState) {}

    fn before(&self, _step: &str, _state: &RunState) {}

    fn after(&self, _step: &str, _state: &RunState, _elapsed: Duration) {}

    fn run_finished(&self, _state: &RunState) {}
}

/// Emits tracing events for every step.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl StepInterceptor for TracingInterceptor {
    fn run_started(&self, state: &RunState) {
        info!(
            run_id = state.run_id(),
            goal = state.goal(),
            max_attempts = state.max_attempts(),
            "Run started"
        );
    }

    fn before(&self, step: &str, state: &RunState) {
        debug!(run_id = state.run_id(), step, attempt = state.attempts(), "Entering step");
    }

    fn after(&self, step: &str, state: &RunState, elapsed: Duration) {
        debug!(
            run_id = state.run_id(),
            step,
            attempt = state.attempts(),
            elapsed_ms = elapsed.as_millis() as u64,
            errors = state.errors().len(),
            "Step complete"
        );
    }

    fn run_finished(&self, state: &RunState) {
        if state.accepted() {
            info!(
                run_id = state.run_id(),
                tool = ?state.selected_tool,
                attempts = state.attempts(),
                "Run accepted"
            );
        } else {
            warn!(
                run_id = state.run_id(),
                tool = ?state.selected_tool,
                attempts = state.attempts(),
                errors = state.errors().len(),
                "Run gave up"
            );
        }
    }
}
