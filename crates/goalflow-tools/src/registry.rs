use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::{LookupBackend, ModelWriter, ToolHandler};
use goalflow_core::types::{RunContext, ToolOutput};

use crate::handlers::{CalcHandler, SearchHandler, Sql2DbtHandler};

/// Registry of tool handlers, keyed by name.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Ceiling applied on top of each handler's own timeout.
    max_timeout_secs: Option<u64>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            max_timeout_secs: None,
        }
    }

    /// Cap every handler invocation at `secs`.
    pub fn with_max_timeout(mut self, secs: u64) -> Self {
        self.max_timeout_secs = Some(secs);
        self
    }

    /// Register a handler under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Register a handler under its own name.
    pub fn register_handler(&mut self, handler: impl ToolHandler) {
        let name = handler.name().to_string();
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Unregister a handler by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// List all registered handler names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    fn timeout_for(&self, handler: &dyn ToolHandler) -> u64 {
        let own = handler.timeout_secs();
        match self.max_timeout_secs {
            Some(cap) => own.min(cap),
            None => own,
        }
    }

    /// Run a handler by name, bounded by its timeout.
    ///
    /// Unregistered names fail closed with `ToolNotFound`.
    pub async fn execute(
        &self,
        name: &str,
        goal: &str,
        context: &RunContext,
    ) -> Result<ToolOutput> {
        let handler = self
            .get(name)
            .ok_or_else(|| GoalflowError::ToolNotFound(name.to_string()))?;

        let timeout_secs = self.timeout_for(handler.as_ref());
        let timeout = Duration::from_secs(timeout_secs);

        match tokio::time::timeout(timeout, handler.handle(goal, context)).await {
            Ok(result) => result,
            Err(_) => Err(GoalflowError::HandlerTimeout {
                tool: name.to_string(),
                timeout_secs,
            }),
        }
    }

    /// Create a registry with the three built-in handlers.
    pub fn with_builtins(
        lookup: Arc<dyn LookupBackend>,
        max_results: usize,
        writer: Arc<dyn ModelWriter>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register_handler(CalcHandler);
        registry.register_handler(SearchHandler::new(lookup, max_results));
        registry.register_handler(Sql2DbtHandler::new(writer));
        registry
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
