use serde::Serialize;
use tracing::{info, warn};

use goalflow_core::types::{RunContext, ToolKind, ToolOutput};
use goalflow_tools::HandlerRegistry;

/// Outcome of one offline evaluation case.
#[derive(Debug, Clone, Serialize)]
pub struct EvalCase {
    pub tool: ToolKind,
    pub goal: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ToolOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fixed smoke cases, one per handler.
pub fn eval_cases() -> Vec<(ToolKind, &'static str, RunContext)> {
    vec![
        (
            ToolKind::Calc,
            "2 + 3 * 5",
            RunContext::new().with_expression("2 + 3 * 5"),
        ),
        (
            ToolKind::Search,
            "LangGraph cyclic workflows",
            RunContext::new().with_query("LangGraph cyclic workflows"),
        ),
        (
            ToolKind::Sql2Dbt,
            "SELECT 1 AS col",
            RunContext::new()
                .with_sql("SELECT 1 AS col")
                .with_model_name("sample_model"),
        ),
    ]
}

/// Run every handler once, directly, bypassing the step graph.
pub async fn offline_evaluate(registry: &HandlerRegistry) -> Vec<EvalCase> {
    let mut report = Vec::new();
    for (tool, goal, context) in eval_cases() {
        let case = match registry.execute(tool.name(), goal, &context).await {
            Ok(output) => {
                info!(tool = %tool, "Eval case passed");
                EvalCase {
                    tool,
                    goal: goal.to_string(),
                    passed: output.has_content(),
                    output: Some(output),
                    error: None,
                }
            }
            Err(e) => {
                warn!(tool = %tool, error = %e, "Eval case failed");
                EvalCase {
                    tool,
                    goal: goal.to_string(),
                    passed: false,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        };
        report.push(case);
    }
    report
}
