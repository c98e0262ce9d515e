//! Step graph engine.
//!
//! A workflow is a set of named [`Step`]s plus one [`Transition`] per step.
//! The [`StepGraph`] walks from the entry step, running each step against the
//! shared [`RunState`](crate::state::RunState) and asking the step's transition
//! where to go next, until a transition answers [`Target::Done`].
//!
//! Graphs are validated when built: the entry exists, every step has a
//! transition, and every transition target names a known step.

pub mod executor;
pub mod interceptor;
pub mod step;
pub mod transition;

pub use executor::{GraphBuilder, GraphError, StepGraph};
pub use interceptor::{StepInterceptor, TracingInterceptor};
pub use step::Step;
pub use transition::{Target, Transition};
