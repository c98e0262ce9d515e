//! The goal-to-result workflow.
//!
//! ```text
//! plan -> interpret -+-> generate -+-> execute -+-> explain -+-> evaluate -> decide
//!                    |  (sql2dbt)  |     ^      |  (calc)    |                 |
//!                    +-------------+     |      +------------+                 |
//!                                        +------- not accepted, attempts left -+
//! ```

use std::sync::Arc;

use goalflow_core::traits::Generator;
use goalflow_core::types::ToolKind;
use goalflow_tools::HandlerRegistry;

use crate::graph::{GraphError, StepGraph, Target, Transition};
use crate::state::RunState;
use crate::steps::{
    DecideStep, EvaluateStep, ExecuteStep, ExplainStep, GenerateStep, InterpretStep, PlanStep,
    DECIDE, EVALUATE, EXECUTE, EXPLAIN, GENERATE, INTERPRET, PLAN,
};

/// Collaborators the workflow's steps are built from.
pub struct WorkflowDeps {
    pub generator: Option<Arc<dyn Generator>>,
    pub registry: Arc<HandlerRegistry>,
    pub temperature: f32,
    pub scope_hint: String,
}

fn uses(tool: ToolKind) -> impl Fn(&RunState) -> bool + Send + Sync + 'static {
    move |state| state.selected_tool == Some(tool)
}

/// Assemble and validate the workflow graph.
pub fn build_workflow(deps: WorkflowDeps) -> Result<StepGraph, GraphError> {
    let WorkflowDeps {
        generator,
        registry,
        temperature,
        scope_hint,
    } = deps;

    StepGraph::builder()
        .step(Arc::new(PlanStep))
        .step(Arc::new(InterpretStep::new(generator.clone())))
        .step(Arc::new(GenerateStep::new(generator.clone(), temperature)))
        .step(Arc::new(ExecuteStep::new(registry)))
        .step(Arc::new(ExplainStep::new(generator, temperature)))
        .step(Arc::new(EvaluateStep::new(scope_hint)))
        .step(Arc::new(DecideStep))
        .transition(PLAN, Transition::always(INTERPRET))
        .transition(
            INTERPRET,
            Transition::when(
                uses(ToolKind::Sql2Dbt),
                Target::step(GENERATE),
                Target::step(EXECUTE),
            ),
        )
        .transition(GENERATE, Transition::always(EXECUTE))
        .transition(
            EXECUTE,
            Transition::when(
                uses(ToolKind::Calc),
                Target::step(EXPLAIN),
                Target::step(EVALUATE),
            ),
        )
        .transition(EXPLAIN, Transition::always(EVALUATE))
        .transition(EVALUATE, Transition::always(DECIDE))
        .transition(
            DECIDE,
            Transition::when(|s| s.is_finished(), Target::Done, Target::step(EXECUTE)),
        )
        .entry(PLAN)
        .build()
}
