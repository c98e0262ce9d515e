use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::{LookupBackend, ToolHandler};
use goalflow_core::types::{RunContext, ToolOutput};

use crate::lookup::prefer_ascii;

/// Looks up `context.query` (or the goal) on a lookup backend.
pub struct SearchHandler {
    backend: Arc<dyn LookupBackend>,
    max_results: usize,
}

impl SearchHandler {
    pub fn new(backend: Arc<dyn LookupBackend>, max_results: usize) -> Self {
        Self {
            backend,
            max_results: max_results.max(1),
        }
    }
}

impl ToolHandler for SearchHandler {
    fn name(&self) -> &str {
        "search"
    }

    fn handle<'a>(
        &'a self,
        goal: &'a str,
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<ToolOutput>> {
        Box::pin(async move {
            let query = context.query.as_deref().unwrap_or(goal).trim();
            let hits = self.backend.lookup(query, self.max_results).await?;
            let hits = prefer_ascii(hits);
            debug!(query, backend = self.backend.name(), hits = hits.len(), "Lookup finished");

            if hits.is_empty() {
                return Err(GoalflowError::NoResults(query.to_string()));
            }

            Ok(ToolOutput::Search {
                query: query.to_string(),
                snippets: hits,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalflow_core::types::SearchHit;
    use goalflow_test_utils::ScriptedLookup;

    #[tokio::test]
    async fn uses_query_over_goal() {
        let lookup = Arc::new(ScriptedLookup::always(vec![SearchHit::new(
            "LangGraph",
            "https://example.com",
            "Cyclic workflows",
        )]));
        let handler = SearchHandler::new(lookup.clone(), 5);
        let ctx = RunContext::new().with_query("cyclic graphs");

        let out = handler.handle("goal text", &ctx).await.unwrap();
        match out {
            ToolOutput::Search { query, snippets } => {
                assert_eq!(query, "cyclic graphs");
                assert_eq!(snippets.len(), 1);
            }
            other => panic!("unexpected output: {:?}", other),
        }
        assert_eq!(lookup.queries(), vec!["cyclic graphs".to_string()]);
    }

    #[tokio::test]
    async fn empty_results_are_an_error() {
        let lookup = Arc::new(ScriptedLookup::always(vec![]));
        let handler = SearchHandler::new(lookup, 5);
        let err = handler
            .handle("obscure thing", &RunContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GoalflowError::NoResults(q) if q == "obscure thing"));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let lookup = Arc::new(ScriptedLookup::failing("rate limited"));
        let handler = SearchHandler::new(lookup, 5);
        let err = handler.handle("q", &RunContext::new()).await.unwrap_err();
        assert!(matches!(err, GoalflowError::Backend { .. }));
    }
}
