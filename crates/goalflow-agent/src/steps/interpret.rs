use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use goalflow_core::traits::Generator;
use goalflow_core::types::ToolKind;
use goalflow_tools::expr::extract_expression;

use super::{prompts, INTERPRET};
use crate::graph::Step;
use crate::state::{ErrorKind, RunState};

/// Pulls the arithmetic expression out of an arithmetic goal.
///
/// With a generator configured the model does the extraction at temperature
/// zero. Without one, a seeded `context.expression` is kept as is and
/// otherwise the goal is scanned for numbers and operators.
pub struct InterpretStep {
    generator: Option<Arc<dyn Generator>>,
}

impl InterpretStep {
    pub fn new(generator: Option<Arc<dyn Generator>>) -> Self {
        Self { generator }
    }
}

impl Step for InterpretStep {
    fn name(&self) -> &str {
        INTERPRET
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if state.selected_tool != Some(ToolKind::Calc) {
                return;
            }

            match &self.generator {
                Some(generator) => {
                    let prompt = prompts::extract_expression(state.goal());
                    match generator
                        .generate(prompts::MATH_PARSER_SYSTEM, &prompt, 0.0)
                        .await
                    {
                        Ok(text) if !text.trim().is_empty() => {
                            debug!(expression = %text.trim(), "Generator extracted expression");
                            state.context.expression = Some(text.trim().to_string());
                        }
                        Ok(_) => {
                            state.push_error(
                                ErrorKind::Extraction,
                                "LLM interpretation failed: empty expression",
                            );
                        }
                        Err(e) => {
                            warn!(error = %e, "Expression extraction failed");
                            state.push_error(
                                ErrorKind::Extraction,
                                format!("LLM interpretation failed: {}", e),
                            );
                        }
                    }
                }
                None => {
                    if state.context.expression.is_some() {
                        return;
                    }
                    match extract_expression(state.goal()) {
                        Some(expression) => state.context.expression = Some(expression),
                        None => state.push_error(
                            ErrorKind::Extraction,
                            "No arithmetic expression found in goal",
                        ),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalflow_core::types::RunContext;
    use goalflow_test_utils::ScriptedGenerator;

    fn calc_state(goal: &str) -> RunState {
        let mut state = RunState::new(goal, 3);
        state.selected_tool = Some(ToolKind::Calc);
        state
    }

    #[tokio::test]
    async fn local_extraction_without_generator() {
        let mut state = calc_state("what is 12 * (3 + 4) please");
        InterpretStep::new(None).run(&mut state).await;
        assert_eq!(state.context.expression.as_deref(), Some("12 * ( 3 + 4 )"));
        assert!(state.errors().is_empty());
    }

    #[tokio::test]
    async fn seeded_expression_is_kept() {
        let mut state = calc_state("calc").with_context(RunContext::new().with_expression("2+*"));
        InterpretStep::new(None).run(&mut state).await;
        assert_eq!(state.context.expression.as_deref(), Some("2+*"));
    }

    #[tokio::test]
    async fn nothing_to_extract_is_an_error() {
        let mut state = calc_state("calculate my happiness");
        InterpretStep::new(None).run(&mut state).await;
        assert_eq!(state.errors()[0].kind, ErrorKind::Extraction);
    }

    #[tokio::test]
    async fn generator_extraction_uses_zero_temperature() {
        let generator = Arc::new(ScriptedGenerator::always("  7*6 \n"));
        let mut state = calc_state("compute seven times six");
        InterpretStep::new(Some(generator.clone())).run(&mut state).await;

        assert_eq!(state.context.expression.as_deref(), Some("7*6"));
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].temperature, 0.0);
        assert_eq!(calls[0].system_prompt, prompts::MATH_PARSER_SYSTEM);
        assert!(calls[0].user_prompt.contains("compute seven times six"));
    }

    #[tokio::test]
    async fn generator_failure_records_extraction_error() {
        let generator = Arc::new(ScriptedGenerator::failing("offline"));
        let mut state = calc_state("compute 1+1");
        InterpretStep::new(Some(generator)).run(&mut state).await;

        assert!(state.context.expression.is_none());
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].kind, ErrorKind::Extraction);
        assert!(state.errors()[0].message.starts_with("LLM interpretation failed"));
    }

    #[tokio::test]
    async fn other_tools_are_untouched() {
        let generator = Arc::new(ScriptedGenerator::always("1+1"));
        let mut state = RunState::new("find things", 3);
        state.selected_tool = Some(ToolKind::Search);
        InterpretStep::new(Some(generator.clone())).run(&mut state).await;
        assert!(state.context.expression.is_none());
        assert!(generator.calls().is_empty());
    }
}
