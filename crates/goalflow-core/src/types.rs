use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The task kinds a goal can be routed to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Arithmetic evaluation.
    Calc,
    /// SQL to dbt model generation.
    Sql2Dbt,
    /// Information lookup. Catch-all for unclassified goals.
    Search,
}

impl ToolKind {
    /// Name under which the handler for this kind is registered.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Calc => "calc",
            ToolKind::Sql2Dbt => "sql2dbt",
            ToolKind::Search => "search",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single lookup hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }
}

/// Output of a successful handler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    Calc {
        expression: String,
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Search {
        query: String,
        snippets: Vec<SearchHit>,
    },
    Model {
        path: String,
        model_name: String,
        model_content: String,
    },
}

impl ToolOutput {
    /// Numeric value of an arithmetic result.
    pub fn value(&self) -> Option<f64> {
        match self {
            ToolOutput::Calc { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Filesystem path of a persisted model.
    pub fn path(&self) -> Option<&str> {
        match self {
            ToolOutput::Model { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether the output carries anything worth accepting.
    pub fn has_content(&self) -> bool {
        match self {
            ToolOutput::Search { snippets, .. } => !snippets.is_empty(),
            _ => true,
        }
    }
}

/// Scratch space shared by the steps and handlers of one run.
///
/// Well-known keys are typed fields; anything else lives in `extra`,
/// keyed by string with JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Arithmetic expression extracted from the goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Lookup query; defaults to the goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// SQL payload for model generation; defaults to the goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Requested model name, sanitized before use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    extra: HashMap<String, serde_json::Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context with the caller's identity.
    pub fn for_user(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Get an untyped value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    /// Get an untyped value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Set an untyped value.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.extra.insert(key.into(), value);
    }

    /// Set an untyped string value.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra
            .insert(key.into(), serde_json::Value::String(value.into()));
    }

    /// The untyped part of the context.
    pub fn extra(&self) -> &HashMap<String, serde_json::Value> {
        &self.extra
    }
}
