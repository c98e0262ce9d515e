use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, error};

use goalflow_core::error::Result;
use goalflow_core::traits::{ModelWriter, ToolHandler};
use goalflow_core::types::{RunContext, ToolOutput};

pub const DEFAULT_MODEL_NAME: &str = "generated_model";

/// Turns `context.sql` (or the goal) into a dbt model file.
pub struct Sql2DbtHandler {
    writer: Arc<dyn ModelWriter>,
}

impl Sql2DbtHandler {
    pub fn new(writer: Arc<dyn ModelWriter>) -> Self {
        Self { writer }
    }
}

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("static regex is valid"))
}

fn underscores_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_+").expect("static regex is valid"))
}

/// Reduce a requested name to a safe dbt model identifier.
pub fn sanitize_model_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced = non_word_re().replace_all(&lowered, "_");
    let collapsed = underscores_re().replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        DEFAULT_MODEL_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Render the model file body.
pub fn render_model(sql: &str, model_name: &str) -> String {
    format!(
        "{{{{ config(materialized='view') }}}}\n\
         -- Auto-generated model: {}\n\
         -- NOTE: Review tests & documentation.\n\
         \n\
         {}\n",
        model_name,
        sql.trim()
    )
}

impl ToolHandler for Sql2DbtHandler {
    fn name(&self) -> &str {
        "sql2dbt"
    }

    fn handle<'a>(
        &'a self,
        goal: &'a str,
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<ToolOutput>> {
        Box::pin(async move {
            let sql = context.sql.as_deref().unwrap_or(goal);
            let model_name =
                sanitize_model_name(context.model_name.as_deref().unwrap_or(DEFAULT_MODEL_NAME));

            let content = render_model(sql, &model_name);
            let path = self
                .writer
                .persist(&content, &format!("{}.sql", model_name))
                .await
                .map_err(|e| {
                    error!(model = %model_name, error = %e, "Failed to persist dbt model");
                    e
                })?;
            debug!(model = %model_name, path = %path.display(), "dbt model written");

            Ok(ToolOutput::Model {
                path: path.display().to_string(),
                model_name,
                model_content: sql.trim().to_string(),
            })
        })
    }
}
