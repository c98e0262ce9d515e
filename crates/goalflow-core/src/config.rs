use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GoalflowError, Result};

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Top-level goalflow configuration.
///
/// Every section has defaults, so an empty file (or no file at all) is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub dbt: DbtConfig,
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum execute→decide cycles per run.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound on a single handler invocation.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
    /// Directory for JSONL step traces. Tracing to file is off when unset.
    #[serde(default)]
    pub trace_dir: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            handler_timeout_secs: default_handler_timeout(),
            trace_dir: None,
        }
    }
}

fn default_max_attempts() -> u32 { 3 }
fn default_handler_timeout() -> u64 { 15 }

/// Remote generator (chat-completions) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// No generator is used when the key is missing.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_request_timeout(),
            retry: None,
        }
    }
}

impl ModelConfig {
    /// Chat-completions endpoint, honouring `base_url`.
    pub fn endpoint(&self) -> &str {
        self.base_url.as_deref().unwrap_or(GROQ_ENDPOINT)
    }

    /// Whether enough is configured to talk to a generator.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

fn default_provider() -> String { "groq".to_string() }
fn default_model_id() -> String { "llama-3.1-8b-instant".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 1024 }
fn default_request_timeout() -> u64 { 15 }

/// Retry configuration for generator requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 5000 }

/// Lookup backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "tavily" or "duckduckgo". Tavily falls back to DuckDuckGo.
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Appended to the goal when a lookup comes back empty.
    #[serde(default = "default_scope_hint")]
    pub scope_hint: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            max_results: default_max_results(),
            scope_hint: default_scope_hint(),
        }
    }
}

fn default_search_provider() -> String { "duckduckgo".to_string() }
fn default_max_results() -> usize { 5 }
fn default_scope_hint() -> String { "site:docs.rs".to_string() }

/// dbt model output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbtConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
}

impl Default for DbtConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
        }
    }
}

fn default_model_dir() -> String { "dbt_models".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| GoalflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| GoalflowError::Config(e.to_string()))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Reject values the orchestrator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.run.max_attempts == 0 {
            return Err(GoalflowError::Config(
                "run.max_attempts must be at least 1".into(),
            ));
        }
        if self.run.handler_timeout_secs == 0 {
            return Err(GoalflowError::Config(
                "run.handler_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fill unset fields from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill unset fields from `lookup`, which maps variable names to values.
    ///
    /// Values already present in the file win over the environment. Fields
    /// with a built-in default count as unset while they still hold it.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("GROQ_API_KEY");
        }
        if self.model.base_url.is_none() {
            self.model.base_url = lookup("GROQ_ENDPOINT");
        }
        if self.model.model_id == default_model_id() {
            if let Some(model) = lookup("LLM_MODEL") {
                self.model.model_id = model;
            }
        }
        if self.model.temperature == default_temperature() {
            if let Some(temp) = lookup("TEMPERATURE").and_then(|t| t.parse().ok()) {
                self.model.temperature = temp;
            }
        }
        if self.dbt.model_dir == default_model_dir() {
            if let Some(dir) = lookup("DBT_DIR") {
                self.dbt.model_dir = dir;
            }
        }
        if self.search.api_key.is_none() {
            if let Some(key) = lookup("TAVILY_API_KEY") {
                self.search.api_key = Some(key);
                self.search.provider = "tavily".to_string();
            }
        }
    }

    /// Resolve the dbt model directory (expand ~).
    pub fn model_dir(&self) -> PathBuf {
        expand_home(&self.dbt.model_dir)
    }

    /// Resolve the trace directory (expand ~), if tracing to file is enabled.
    pub fn trace_dir(&self) -> Option<PathBuf> {
        self.run.trace_dir.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

pub fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
