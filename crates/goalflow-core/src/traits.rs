use std::path::PathBuf;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{RunContext, SearchHit, ToolOutput};

/// Text generator: a remote chat model behind a single prompt call.
pub trait Generator: Send + Sync + 'static {
    /// Produce text for a system/user prompt pair.
    ///
    /// Fails with `Network`, `Remote` or `EmptyResponse`.
    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        temperature: f32,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Lookup backend. Returns ordered hits for a query.
pub trait LookupBackend: Send + Sync + 'static {
    /// Backend name, for logs and error messages.
    fn name(&self) -> &str;

    /// Fails with `NoResults` or `Backend`.
    fn lookup<'a>(&'a self, query: &'a str, max_results: usize)
        -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

/// Persists generated model files.
pub trait ModelWriter: Send + Sync + 'static {
    /// Write `content` under a file named from `suggested_name`, returning its path.
    fn persist<'a>(
        &'a self,
        content: &'a str,
        suggested_name: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

/// Execution logic for one task kind.
///
/// A handler sees only the goal and the run context. It must be idempotent
/// for the same context so that retries are safe.
pub trait ToolHandler: Send + Sync + 'static {
    /// Handler name (matches `ToolKind::name`).
    fn name(&self) -> &str;

    fn handle<'a>(&'a self, goal: &'a str, context: &'a RunContext)
        -> BoxFuture<'a, Result<ToolOutput>>;

    /// Timeout in seconds for a single invocation.
    fn timeout_secs(&self) -> u64 {
        15
    }
}
