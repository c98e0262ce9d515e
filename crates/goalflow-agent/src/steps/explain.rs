use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use goalflow_core::traits::Generator;
use goalflow_core::types::ToolOutput;

use super::{prompts, EXPLAIN};
use crate::graph::Step;
use crate::state::{ErrorKind, RunState};

/// Attaches a plain-language explanation to an arithmetic result.
///
/// Failures are recorded as non-blocking; the result stands either way.
pub struct ExplainStep {
    generator: Option<Arc<dyn Generator>>,
    temperature: f32,
}

impl ExplainStep {
    pub fn new(generator: Option<Arc<dyn Generator>>, temperature: f32) -> Self {
        Self {
            generator,
            temperature,
        }
    }
}

impl Step for ExplainStep {
    fn name(&self) -> &str {
        EXPLAIN
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(generator) = &self.generator else {
                return;
            };
            let Some(ToolOutput::Calc {
                expression, value, ..
            }) = &state.result
            else {
                return;
            };

            let prompt = prompts::explain_result(expression, *value);
            match generator
                .generate(prompts::EXPLAIN_SYSTEM, &prompt, self.temperature)
                .await
            {
                Ok(text) => {
                    if let Some(ToolOutput::Calc { explanation, .. }) = &mut state.result {
                        *explanation = Some(text.trim().to_string());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Explanation failed, keeping bare result");
                    state.push_error(
                        ErrorKind::Explanation,
                        format!("LLM explanation failed: {}", e),
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalflow_core::types::ToolKind;
    use goalflow_test_utils::ScriptedGenerator;

    fn with_result() -> RunState {
        let mut state = RunState::new("2+3*5", 3);
        state.selected_tool = Some(ToolKind::Calc);
        state.result = Some(ToolOutput::Calc {
            expression: "2+3*5".into(),
            value: 17.0,
            explanation: None,
        });
        state
    }

    #[tokio::test]
    async fn attaches_explanation() {
        let generator = Arc::new(ScriptedGenerator::always("Multiply first, then add.\n"));
        let mut state = with_result();
        ExplainStep::new(Some(generator.clone()), 0.2)
            .run(&mut state)
            .await;

        match &state.result {
            Some(ToolOutput::Calc { explanation, .. }) => {
                assert_eq!(explanation.as_deref(), Some("Multiply first, then add."))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(generator.calls()[0].user_prompt.contains("17"));
    }

    #[tokio::test]
    async fn failure_is_non_blocking() {
        let generator = Arc::new(ScriptedGenerator::failing("rate limited"));
        let mut state = with_result();
        ExplainStep::new(Some(generator), 0.2).run(&mut state).await;

        assert_eq!(state.result.as_ref().and_then(ToolOutput::value), Some(17.0));
        assert_eq!(state.errors()[0].kind, ErrorKind::Explanation);
        assert!(!state.has_blocking_cycle_errors());
    }

    #[tokio::test]
    async fn skipped_without_result() {
        let generator = Arc::new(ScriptedGenerator::always("unused"));
        let mut state = RunState::new("2+*", 3);
        ExplainStep::new(Some(generator.clone()), 0.2)
            .run(&mut state)
            .await;
        assert!(generator.calls().is_empty());
    }
}
