use futures::future::BoxFuture;
use tracing::debug;

use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::ToolHandler;
use goalflow_core::types::{RunContext, ToolOutput};

use crate::expr;

/// Evaluates `context.expression` with the safe arithmetic evaluator.
pub struct CalcHandler;

impl ToolHandler for CalcHandler {
    fn name(&self) -> &str {
        "calc"
    }

    fn handle<'a>(
        &'a self,
        _goal: &'a str,
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<ToolOutput>> {
        Box::pin(async move {
            let expression = context
                .expression
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    GoalflowError::Eval("No valid arithmetic expression found.".into())
                })?;

            let value =
                expr::evaluate(expression).map_err(|e| GoalflowError::Eval(e.to_string()))?;
            debug!(expression, value, "Evaluated expression");

            Ok(ToolOutput::Calc {
                expression: expression.to_string(),
                value,
                explanation: None,
            })
        })
    }

    fn timeout_secs(&self) -> u64 {
        5
    }
}
