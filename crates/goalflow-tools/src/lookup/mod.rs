pub mod duckduckgo;
pub mod tavily;

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use goalflow_core::config::SearchConfig;
use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::LookupBackend;
use goalflow_core::types::SearchHit;

pub use duckduckgo::DuckDuckGoLookup;
pub use tavily::TavilyLookup;

/// Drop hits with non-ASCII snippets, unless that would drop all of them.
pub fn prefer_ascii(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let ascii: Vec<SearchHit> = hits
        .iter()
        .filter(|h| h.snippet.is_ascii())
        .cloned()
        .collect();
    if ascii.is_empty() {
        hits
    } else {
        ascii
    }
}

/// Tries each backend in order until one returns hits.
pub struct FallbackLookup {
    backends: Vec<Arc<dyn LookupBackend>>,
}

impl FallbackLookup {
    pub fn new(backends: Vec<Arc<dyn LookupBackend>>) -> Self {
        Self { backends }
    }
}

impl LookupBackend for FallbackLookup {
    fn name(&self) -> &str {
        "fallback"
    }

    fn lookup<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            let mut last_err = None;
            for backend in &self.backends {
                match backend.lookup(query, max_results).await {
                    Ok(hits) if !hits.is_empty() => return Ok(hits),
                    Ok(_) => {
                        warn!(backend = backend.name(), query, "Lookup returned nothing, trying next backend");
                    }
                    Err(e) => {
                        warn!(backend = backend.name(), error = %e, "Lookup failed, trying next backend");
                        last_err = Some(e);
                    }
                }
            }
            match last_err {
                Some(e) => Err(e),
                None => Ok(vec![]),
            }
        })
    }
}

/// Build the lookup chain described by config.
///
/// DuckDuckGo needs no key and always ends the chain.
pub fn create_lookup(config: &SearchConfig) -> Result<Arc<dyn LookupBackend>> {
    let ddg: Arc<dyn LookupBackend> = Arc::new(DuckDuckGoLookup::new());
    match config.provider.as_str() {
        "duckduckgo" | "ddg" => Ok(ddg),
        "tavily" => {
            let key = config.api_key.as_deref().ok_or_else(|| {
                GoalflowError::Config("search.api_key is required for tavily".into())
            })?;
            Ok(Arc::new(FallbackLookup::new(vec![
                Arc::new(TavilyLookup::new(key)),
                ddg,
            ])))
        }
        other => Err(GoalflowError::Config(format!(
            "unknown search provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalflow_test_utils::ScriptedLookup;

    #[test]
    fn test_prefer_ascii() {
        let hits = vec![
            SearchHit::new("a", "#", "plain text"),
            SearchHit::new("b", "#", "texte accentué"),
        ];
        let kept = prefer_ascii(hits);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "a");

        let only_unicode = vec![SearchHit::new("c", "#", "日本語")];
        assert_eq!(prefer_ascii(only_unicode).len(), 1);
    }

    #[test]
    fn test_create_lookup_requires_tavily_key() {
        let config = SearchConfig {
            provider: "tavily".into(),
            api_key: None,
            ..SearchConfig::default()
        };
        assert!(create_lookup(&config).is_err());

        let config = SearchConfig {
            provider: "bing".into(),
            ..SearchConfig::default()
        };
        assert!(create_lookup(&config).is_err());

        assert!(create_lookup(&SearchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn fallback_skips_failures_and_empties() {
        let hit = SearchHit::new("t", "https://x", "s");
        let chain = FallbackLookup::new(vec![
            Arc::new(ScriptedLookup::failing("down")),
            Arc::new(ScriptedLookup::always(vec![])),
            Arc::new(ScriptedLookup::always(vec![hit.clone()])),
        ]);
        assert_eq!(chain.lookup("q", 5).await.unwrap(), vec![hit]);
    }

    #[tokio::test]
    async fn fallback_reports_last_error() {
        let chain = FallbackLookup::new(vec![
            Arc::new(ScriptedLookup::always(vec![])),
            Arc::new(ScriptedLookup::failing("down")),
        ]);
        assert!(chain.lookup("q", 5).await.is_err());

        let empty = FallbackLookup::new(vec![Arc::new(ScriptedLookup::always(vec![]))]);
        assert!(empty.lookup("q", 5).await.unwrap().is_empty());
    }
}
