use futures::future::BoxFuture;
use tracing::{debug, info};

use goalflow_core::types::ToolKind;

use super::EVALUATE;
use crate::graph::Step;
use crate::state::RunState;

pub const DEFAULT_SCOPE_HINT: &str = "site:docs.rs";

/// Accepts the cycle's result, or applies a correction for the next attempt.
///
/// A cycle is accepted when it produced a result with content and recorded no
/// blocking errors. Acceptance is sticky.
pub struct EvaluateStep {
    scope_hint: String,
}

impl EvaluateStep {
    pub fn new(scope_hint: impl Into<String>) -> Self {
        Self {
            scope_hint: scope_hint.into(),
        }
    }
}

impl Default for EvaluateStep {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_HINT)
    }
}

/// Narrow the next attempt according to the tool that failed.
fn correct(state: &mut RunState, scope_hint: &str) {
    match state.selected_tool {
        Some(ToolKind::Calc) => {
            let source = state
                .context
                .expression
                .clone()
                .unwrap_or_else(|| state.goal().to_string());
            let compact: String = source.chars().filter(|c| !c.is_whitespace()).collect();
            debug!(expression = %compact, "Compacted expression for retry");
            state.context.expression = Some(compact);
        }
        Some(ToolKind::Search) => {
            let empty = state.result.as_ref().map_or(true, |r| !r.has_content());
            if empty {
                let query = format!("{} {}", state.goal(), scope_hint);
                debug!(query = %query, "Scoped query for retry");
                state.context.query = Some(query);
            }
        }
        Some(ToolKind::Sql2Dbt) => {
            let sql = state
                .context
                .sql
                .clone()
                .unwrap_or_else(|| state.goal().to_string());
            let trimmed = sql.trim_end();
            if !trimmed.ends_with(';') {
                state.context.sql = Some(format!("{};", trimmed));
            }
        }
        None => {}
    }
}

impl Step for EvaluateStep {
    fn name(&self) -> &str {
        EVALUATE
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if state.accepted() {
                return;
            }

            let has_content = state.result.as_ref().is_some_and(|r| r.has_content());
            if has_content && !state.has_blocking_cycle_errors() {
                info!(run_id = state.run_id(), attempt = state.attempts(), "Result accepted");
                state.accept();
                return;
            }

            correct(state, &self.scope_hint);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalflow_core::types::{RunContext, ToolOutput};
    use crate::state::ErrorKind;

    fn state_for(tool: ToolKind, goal: &str) -> RunState {
        let mut state = RunState::new(goal, 3);
        state.selected_tool = Some(tool);
        state
    }

    #[tokio::test]
    async fn accepts_clean_result() {
        let mut state = state_for(ToolKind::Calc, "1+1");
        state.begin_cycle();
        state.result = Some(ToolOutput::Calc {
            expression: "1+1".into(),
            value: 2.0,
            explanation: None,
        });
        EvaluateStep::default().run(&mut state).await;
        assert!(state.accepted());
    }

    #[tokio::test]
    async fn earlier_cycle_errors_do_not_block() {
        let mut state = state_for(ToolKind::Calc, "1+1");
        state.push_error(ErrorKind::Handler, "first cycle");
        state.begin_cycle();
        state.result = Some(ToolOutput::Calc {
            expression: "1+1".into(),
            value: 2.0,
            explanation: None,
        });
        EvaluateStep::default().run(&mut state).await;
        assert!(state.accepted());
    }

    #[tokio::test]
    async fn calc_retry_compacts_expression() {
        let mut state = state_for(ToolKind::Calc, "calc")
            .with_context(RunContext::new().with_expression(" 2 + *  3"));
        state.push_error(ErrorKind::Handler, "bad");
        EvaluateStep::default().run(&mut state).await;
        assert!(!state.accepted());
        assert_eq!(state.context.expression.as_deref(), Some("2+*3"));
    }

    #[tokio::test]
    async fn search_retry_scopes_query() {
        let mut state = state_for(ToolKind::Search, "tokio select");
        EvaluateStep::new("site:tokio.rs").run(&mut state).await;
        assert_eq!(state.context.query.as_deref(), Some("tokio select site:tokio.rs"));
    }

    #[tokio::test]
    async fn search_without_hits_is_not_accepted() {
        let mut state = state_for(ToolKind::Search, "obscure");
        state.result = Some(ToolOutput::Search {
            query: "obscure".into(),
            snippets: vec![],
        });
        EvaluateStep::default().run(&mut state).await;
        assert!(!state.accepted());
        assert_eq!(state.context.query.as_deref(), Some("obscure site:docs.rs"));
    }

    #[tokio::test]
    async fn sql_retry_terminates_statement() {
        let mut state = state_for(ToolKind::Sql2Dbt, "dbt: SELECT 1 ");
        EvaluateStep::default().run(&mut state).await;
        assert_eq!(state.context.sql.as_deref(), Some("dbt: SELECT 1;"));

        EvaluateStep::default().run(&mut state).await;
        assert_eq!(state.context.sql.as_deref(), Some("dbt: SELECT 1;"));
    }

    #[tokio::test]
    async fn acceptance_is_sticky() {
        let mut state = state_for(ToolKind::Calc, "1+1");
        state.accept();
        state.push_error(ErrorKind::Handler, "late");
        EvaluateStep::default().run(&mut state).await;
        assert!(state.accepted());
        assert!(state.context.expression.is_none());
    }
}
