use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use goalflow_core::error::GoalflowError;
use goalflow_tools::HandlerRegistry;

use super::EXECUTE;
use crate::graph::Step;
use crate::state::{ErrorKind, RunState};

/// Dispatches to the handler registered for the selected tool.
///
/// Opens a new cycle, then records exactly one of `result` or an error.
pub struct ExecuteStep {
    registry: Arc<HandlerRegistry>,
}

impl ExecuteStep {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }
}

impl Step for ExecuteStep {
    fn name(&self) -> &str {
        EXECUTE
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            state.begin_cycle();

            let Some(tool) = state.selected_tool else {
                state.push_error(ErrorKind::Dispatch, "No tool selected");
                return;
            };

            let outcome = self
                .registry
                .execute(tool.name(), state.goal(), &state.context)
                .await;

            match outcome {
                Ok(output) => {
                    info!(run_id = state.run_id(), tool = %tool, attempt = state.attempts(), "Handler succeeded");
                    state.result = Some(output);
                }
                Err(GoalflowError::ToolNotFound(name)) => {
                    warn!(tool = %name, "No handler registered");
                    state.push_error(ErrorKind::Dispatch, format!("Unknown tool: {}", name));
                }
                Err(e) => {
                    warn!(tool = %tool, attempt = state.attempts(), error = %e, "Handler failed");
                    state.push_error(ErrorKind::Handler, e.to_string());
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalflow_core::types::{RunContext, ToolKind, ToolOutput};
    use goalflow_tools::CalcHandler;

    fn registry_with_calc() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        registry.register_handler(CalcHandler);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn writes_result_on_success() {
        let mut state =
            RunState::new("2+2", 3).with_context(RunContext::new().with_expression("2+2"));
        state.selected_tool = Some(ToolKind::Calc);
        ExecuteStep::new(registry_with_calc()).run(&mut state).await;

        assert_eq!(state.result.as_ref().and_then(ToolOutput::value), Some(4.0));
        assert!(state.errors().is_empty());
    }

    #[tokio::test]
    async fn writes_error_on_failure() {
        let mut state =
            RunState::new("2+*", 3).with_context(RunContext::new().with_expression("2+*"));
        state.selected_tool = Some(ToolKind::Calc);
        ExecuteStep::new(registry_with_calc()).run(&mut state).await;

        assert!(state.result.is_none());
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].kind, ErrorKind::Handler);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_dispatch_error() {
        let mut state = RunState::new("look it up", 3);
        state.selected_tool = Some(ToolKind::Search);
        ExecuteStep::new(registry_with_calc()).run(&mut state).await;

        assert!(state.result.is_none());
        assert_eq!(state.errors()[0].kind, ErrorKind::Dispatch);
        assert_eq!(state.errors()[0].message, "Unknown tool: search");
    }

    #[tokio::test]
    async fn new_cycle_clears_stale_result() {
        let mut state = RunState::new("look it up", 3);
        state.selected_tool = Some(ToolKind::Search);
        state.result = Some(ToolOutput::Search {
            query: "old".into(),
            snippets: vec![],
        });
        ExecuteStep::new(registry_with_calc()).run(&mut state).await;
        assert!(state.result.is_none());
    }
}
