use futures::future::BoxFuture;
use tracing::info;

use goalflow_core::types::ToolKind;

use super::PLAN;
use crate::graph::Step;
use crate::state::RunState;

const CALC_KEYWORDS: &[&str] = &["calc", "calculate", "compute", "expression"];
const DBT_KEYWORDS: &[&str] = &["dbt", "sql2dbt", "convert sql", "model"];

/// Whether the whole goal reads as a bare arithmetic expression.
fn is_arithmetic(goal: &str) -> bool {
    let trimmed = goal.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || ".+-*/^()".contains(c))
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed.chars().any(|c| "+-*/^".contains(c))
}

/// Route a goal to a tool kind. First match wins; lookup is the catch-all.
pub fn classify(goal: &str) -> ToolKind {
    let lowered = goal.to_lowercase();
    if CALC_KEYWORDS.iter().any(|k| lowered.contains(k)) || is_arithmetic(goal) {
        ToolKind::Calc
    } else if DBT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        ToolKind::Sql2Dbt
    } else {
        ToolKind::Search
    }
}

/// Picks the tool for the run.
pub struct PlanStep;

impl Step for PlanStep {
    fn name(&self) -> &str {
        PLAN
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let tool = classify(state.goal());
            info!(run_id = state.run_id(), tool = %tool, "Selected tool");
            state.selected_tool = Some(tool);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("Please calculate 2 plus 2"), ToolKind::Calc);
        assert_eq!(classify("COMPUTE the total"), ToolKind::Calc);
        assert_eq!(classify("convert sql to a dbt model"), ToolKind::Sql2Dbt);
        assert_eq!(classify("Build a Model for orders"), ToolKind::Sql2Dbt);
        assert_eq!(classify("find rust async tutorials"), ToolKind::Search);
        assert_eq!(classify("what is tokio"), ToolKind::Search);
    }

    #[test]
    fn test_classify_bare_expression() {
        assert_eq!(classify("2+3*5"), ToolKind::Calc);
        assert_eq!(classify(" (1.5 + 2) ^ 2 "), ToolKind::Calc);
        assert_eq!(classify("2+*"), ToolKind::Calc);
        assert_eq!(classify("2024"), ToolKind::Search);
        assert_eq!(classify("+-"), ToolKind::Search);
    }

    #[test]
    fn test_calc_wins_over_dbt() {
        assert_eq!(classify("calculate rows in dbt model"), ToolKind::Calc);
    }

    #[tokio::test]
    async fn plan_sets_selected_tool() {
        let mut state = RunState::new("SELECT 1 for dbt", 3);
        PlanStep.run(&mut state).await;
        assert_eq!(state.selected_tool, Some(ToolKind::Sql2Dbt));
    }
}
