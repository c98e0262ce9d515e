use std::time::Duration;

use futures::future::BoxFuture;

use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::LookupBackend;
use goalflow_core::types::SearchHit;

const DDG_URL: &str = "https://api.duckduckgo.com/";

/// DuckDuckGo instant-answer API. Needs no key.
pub struct DuckDuckGoLookup {
    http: reqwest::Client,
}

impl DuckDuckGoLookup {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for DuckDuckGoLookup {
    fn default() -> Self {
        Self::new()
    }
}

fn backend_error(message: impl ToString) -> GoalflowError {
    GoalflowError::Backend {
        backend: "duckduckgo".into(),
        message: message.to_string(),
    }
}

/// Related topics come as `{Text, FirstURL}` or as named groups with nested `Topics`.
fn collect_topics(topics: &[serde_json::Value], out: &mut Vec<SearchHit>) {
    for topic in topics {
        if let Some(nested) = topic["Topics"].as_array() {
            collect_topics(nested, out);
            continue;
        }
        let text = topic["Text"].as_str().unwrap_or("");
        if text.is_empty() {
            continue;
        }
        // The text leads with the topic title, separated by " - ".
        let title = text.split(" - ").next().unwrap_or(text);
        out.push(SearchHit::new(
            title,
            topic["FirstURL"].as_str().unwrap_or("#"),
            text,
        ));
    }
}

/// Map an instant-answer body to hits, abstract first.
fn parse_answer(body: &serde_json::Value) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = body["AbstractText"].as_str().unwrap_or("");
    if !abstract_text.is_empty() {
        let heading = body["Heading"].as_str().filter(|h| !h.is_empty());
        hits.push(SearchHit::new(
            heading.unwrap_or("Untitled"),
            body["AbstractURL"].as_str().unwrap_or("#"),
            abstract_text,
        ));
    }

    let answer = body["Answer"].as_str().unwrap_or("");
    if !answer.is_empty() {
        hits.push(SearchHit::new("Answer", "#", answer));
    }

    if let Some(topics) = body["RelatedTopics"].as_array() {
        collect_topics(topics, &mut hits);
    }
    hits
}

impl LookupBackend for DuckDuckGoLookup {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn lookup<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            let resp = self
                .http
                .get(DDG_URL)
                .timeout(Duration::from_secs(15))
                .query(&[
                    ("q", query),
                    ("format", "json"),
                    ("no_html", "1"),
                    ("skip_disambig", "1"),
                ])
                .send()
                .await
                .map_err(backend_error)?;

            if !resp.status().is_success() {
                return Err(backend_error(format!("HTTP {}", resp.status())));
            }

            // The API answers with a javascript content type, so parse by hand.
            let text = resp.text().await.map_err(backend_error)?;
            let body: serde_json::Value = serde_json::from_str(&text)?;
            let mut hits = parse_answer(&body);
            hits.truncate(max_results);
            Ok(hits)
        })
    }
}
