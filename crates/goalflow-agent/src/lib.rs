//! Goal orchestration: a fixed step graph that routes a goal to one of the
//! registered handlers, evaluates the result, and retries with corrections
//! until it is accepted or the attempt bound is reached.

pub mod eval;
pub mod graph;
pub mod orchestrator;
pub mod state;
pub mod steps;
pub mod trace_log;
pub mod workflow;

pub use eval::{offline_evaluate, EvalCase};
pub use graph::{StepInterceptor, TracingInterceptor};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use state::{ErrorKind, RunError, RunOutcome, RunState, DEFAULT_MAX_ATTEMPTS};
pub use steps::classify;
pub use trace_log::TraceLog;
