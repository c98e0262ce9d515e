use serde::{Deserialize, Serialize};

use goalflow_core::types::{RunContext, ToolKind, ToolOutput};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What produced a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Goal could not be routed. Reserved; routing always falls back to search.
    Classification,
    /// Expression extraction failed. Recorded by `interpret` before the first
    /// cycle opens, so it only shows up in acceptance through the handler.
    Extraction,
    /// No handler registered for the selected tool.
    Dispatch,
    /// The handler ran and failed, or timed out.
    Handler,
    /// Payload refinement failed; the original payload is used instead.
    Refinement,
    /// Result explanation failed; the result itself stands.
    Explanation,
    /// The step graph could not continue.
    Graph,
}

impl ErrorKind {
    /// Blocking errors veto acceptance of the cycle they were recorded in.
    /// Errors recorded before the first [`RunState::begin_cycle`] belong to
    /// no cycle.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ErrorKind::Refinement | ErrorKind::Explanation)
    }
}

/// One entry in a run's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
    /// Attempt counter at the time the error was recorded.
    pub cycle: u32,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Mutable record carried through every step of one run.
///
/// The goal and attempt bound are fixed at creation. `attempts` only moves
/// forward through [`RunState::advance_attempt`], and the error log only grows.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: String,
    goal: String,
    max_attempts: u32,
    attempts: u32,
    accepted: bool,
    errors: Vec<RunError>,
    /// Index into `errors` where the current cycle began.
    cycle_start: usize,
    pub selected_tool: Option<ToolKind>,
    pub context: RunContext,
    pub result: Option<ToolOutput>,
}

impl RunState {
    /// A fresh state. A bound of zero is raised to one.
    pub fn new(goal: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            max_attempts: max_attempts.max(1),
            attempts: 0,
            accepted: false,
            errors: Vec::new(),
            cycle_start: 0,
            selected_tool: None,
            context: RunContext::new(),
            result: None,
        }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    pub fn errors(&self) -> &[RunError] {
        &self.errors
    }

    /// Errors recorded since the current cycle began.
    pub fn cycle_errors(&self) -> &[RunError] {
        &self.errors[self.cycle_start.min(self.errors.len())..]
    }

    pub fn has_blocking_cycle_errors(&self) -> bool {
        self.cycle_errors().iter().any(|e| e.kind.is_blocking())
    }

    /// Accepted, or out of attempts.
    pub fn is_finished(&self) -> bool {
        self.accepted || self.attempts >= self.max_attempts
    }

    pub fn push_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(RunError {
            kind,
            message: message.into(),
            cycle: self.attempts,
        });
    }

    /// Start a new execution cycle: forget the previous result and scope
    /// acceptance to errors recorded from here on.
    pub fn begin_cycle(&mut self) {
        self.cycle_start = self.errors.len();
        self.result = None;
    }

    pub(crate) fn accept(&mut self) {
        self.accepted = true;
    }

    pub(crate) fn advance_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Freeze the state into the value returned to callers.
    pub fn into_outcome(self, steps: Vec<String>) -> RunOutcome {
        RunOutcome {
            run_id: self.run_id,
            goal: self.goal,
            selected_tool: self.selected_tool,
            result: self.result,
            errors: self.errors,
            context: self.context,
            accepted: self.accepted,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            steps,
        }
    }
}

/// Final state of a run, as handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub goal: String,
    pub selected_tool: Option<ToolKind>,
    pub result: Option<ToolOutput>,
    pub errors: Vec<RunError>,
    pub context: RunContext,
    pub accepted: bool,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Step names in the order they ran.
    pub steps: Vec<String>,
}

impl RunOutcome {
    pub fn error_messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &RunError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bound_is_raised() {
        let state = RunState::new("goal", 0);
        assert_eq!(state.max_attempts(), 1);
        assert!(!state.is_finished());
    }

    #[test]
    fn test_cycle_scoping() {
        let mut state = RunState::new("goal", 3);
        state.push_error(ErrorKind::Handler, "first cycle failed");
        assert!(state.has_blocking_cycle_errors());

        state.advance_attempt();
        state.begin_cycle();
        assert!(state.cycle_errors().is_empty());
        assert!(!state.has_blocking_cycle_errors());
        assert_eq!(state.errors().len(), 1);

        state.push_error(ErrorKind::Explanation, "no explanation");
        assert!(!state.has_blocking_cycle_errors());
        assert_eq!(state.errors()[1].cycle, 1);
    }

    #[test]
    fn test_error_before_first_cycle_is_outside_its_window() {
        let mut state = RunState::new("calculate the answer", 2);
        state.push_error(ErrorKind::Extraction, "generator unreachable");
        assert!(state.has_blocking_cycle_errors());

        state.begin_cycle();
        assert!(state.cycle_errors().is_empty());
        assert!(!state.has_blocking_cycle_errors());
        assert_eq!(state.errors()[0].cycle, 0);
    }

    #[test]
    fn test_begin_cycle_clears_result() {
        let mut state = RunState::new("goal", 3);
        state.result = Some(ToolOutput::Calc {
            expression: "1".into(),
            value: 1.0,
            explanation: None,
        });
        state.begin_cycle();
        assert!(state.result.is_none());
    }

    #[test]
    fn test_finished_when_bound_reached() {
        let mut state = RunState::new("goal", 2);
        state.advance_attempt();
        assert!(!state.is_finished());
        state.advance_attempt();
        assert!(state.is_finished());
    }

    #[test]
    fn test_blocking_kinds() {
        assert!(ErrorKind::Dispatch.is_blocking());
        assert!(ErrorKind::Handler.is_blocking());
        assert!(ErrorKind::Extraction.is_blocking());
        assert!(!ErrorKind::Refinement.is_blocking());
        assert!(!ErrorKind::Explanation.is_blocking());
    }

    #[test]
    fn test_outcome_serializes() {
        let mut state = RunState::new("2+2", 3);
        state.selected_tool = Some(ToolKind::Calc);
        state.push_error(ErrorKind::Handler, "boom");
        let outcome = state.into_outcome(vec!["plan".into()]);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["selected_tool"], "calc");
        assert_eq!(json["errors"][0]["kind"], "handler");
        assert_eq!(outcome.error_messages(), vec!["boom"]);
    }
}
