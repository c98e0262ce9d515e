use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use goalflow_core::traits::Generator;
use goalflow_core::types::ToolKind;

use super::{prompts, GENERATE};
use crate::graph::Step;
use crate::state::{ErrorKind, RunState};

/// Strip a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("sql", "jinja", ...) on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Refines the SQL payload into a single dbt model through the generator.
///
/// A failed refinement is recorded but does not block the run; the handler
/// falls back to the unrefined payload.
pub struct GenerateStep {
    generator: Option<Arc<dyn Generator>>,
    temperature: f32,
}

impl GenerateStep {
    pub fn new(generator: Option<Arc<dyn Generator>>, temperature: f32) -> Self {
        Self {
            generator,
            temperature,
        }
    }
}

impl Step for GenerateStep {
    fn name(&self) -> &str {
        GENERATE
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if state.selected_tool != Some(ToolKind::Sql2Dbt) {
                return;
            }
            let Some(generator) = &self.generator else {
                debug!("No generator configured, using SQL as given");
                return;
            };

            let sql = state
                .context
                .sql
                .clone()
                .unwrap_or_else(|| state.goal().to_string());
            let prompt = prompts::refine_sql(&sql);

            match generator
                .generate(prompts::DBT_SYSTEM, &prompt, self.temperature)
                .await
            {
                Ok(text) => {
                    let refined = strip_code_fence(&text);
                    if refined.is_empty() {
                        state.push_error(
                            ErrorKind::Refinement,
                            "Generator refinement failed: empty model",
                        );
                    } else {
                        state.context.sql = Some(refined.to_string());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SQL refinement failed, keeping original payload");
                    state.push_error(
                        ErrorKind::Refinement,
                        format!("Generator refinement failed: {}", e),
                    );
                }
            }
        })
    }
}
