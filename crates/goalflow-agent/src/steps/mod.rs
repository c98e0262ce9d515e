//! The workflow's steps, one per module.

pub mod decide;
pub mod evaluate;
pub mod execute;
pub mod explain;
pub mod generate;
pub mod interpret;
pub mod plan;
pub mod prompts;

pub use decide::DecideStep;
pub use evaluate::{EvaluateStep, DEFAULT_SCOPE_HINT};
pub use execute::ExecuteStep;
pub use explain::ExplainStep;
pub use generate::GenerateStep;
pub use interpret::InterpretStep;
pub use plan::{classify, PlanStep};

pub const PLAN: &str = "plan";
pub const INTERPRET: &str = "interpret";
pub const GENERATE: &str = "generate";
pub const EXECUTE: &str = "execute";
pub const EXPLAIN: &str = "explain";
pub const EVALUATE: &str = "evaluate";
pub const DECIDE: &str = "decide";
