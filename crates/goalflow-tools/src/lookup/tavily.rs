use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;

use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::LookupBackend;
use goalflow_core::types::SearchHit;

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilyLookup {
    api_key: String,
    http: reqwest::Client,
}

impl TavilyLookup {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

fn backend_error(message: impl ToString) -> GoalflowError {
    GoalflowError::Backend {
        backend: "tavily".into(),
        message: message.to_string(),
    }
}

/// Map a Tavily response body to hits.
fn parse_results(body: &serde_json::Value) -> Vec<SearchHit> {
    body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|r| {
                    SearchHit::new(
                        r["title"].as_str().unwrap_or("Untitled"),
                        r["url"].as_str().unwrap_or("#"),
                        r["content"].as_str().unwrap_or(""),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

impl LookupBackend for TavilyLookup {
    fn name(&self) -> &str {
        "tavily"
    }

    fn lookup<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(TAVILY_URL)
                .timeout(Duration::from_secs(15))
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": max_results,
                }))
                .send()
                .await
                .map_err(backend_error)?;

            if !resp.status().is_success() {
                return Err(backend_error(format!("HTTP {}", resp.status())));
            }

            let body: serde_json::Value = resp.json().await.map_err(backend_error)?;
            let mut hits = parse_results(&body);
            hits.truncate(max_results);
            Ok(hits)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let body = json!({
            "results": [
                {"title": "Tokio", "url": "https://tokio.rs", "content": "An async runtime"},
                {"url": "https://example.com"}
            ]
        });
        let hits = parse_results(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], SearchHit::new("Tokio", "https://tokio.rs", "An async runtime"));
        assert_eq!(hits[1].title, "Untitled");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_parse_results_missing_array() {
        assert!(parse_results(&json!({"error": "bad key"})).is_empty());
    }
}
