//! Web search provider seam and the Exa-style HTTP adapter.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use weft_core::types::SearchResult;

pub const DEFAULT_NUM_RESULTS: usize = 5;

const EXA_BASE_URL: &str = "https://api.exa.ai";

/// The web search seam: query + result count in, scored documents out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> anyhow::Result<Vec<SearchResult>>;
}

/// Exa search-and-contents API client.
pub struct ExaSearch {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExaSearch {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(EXA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

/// Pull `{url, title, text}` rows out of an Exa response body.
fn parse_results(body: &serde_json::Value, max: usize) -> Vec<SearchResult> {
    let empty = vec![];
    let results = body["results"].as_array().unwrap_or(&empty);
    results
        .iter()
        .take(max)
        .filter_map(|r| {
            Some(SearchResult {
                url: r["url"].as_str()?.to_string(),
                title: r["title"].as_str().unwrap_or("").to_string(),
                text: r["text"].as_str().unwrap_or("").to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl SearchProvider for ExaSearch {
    async fn search(&self, query: &str, num_results: usize) -> anyhow::Result<Vec<SearchResult>> {
        debug!(query, num_results, "web search");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "query": query,
                "numResults": num_results,
                "contents": { "text": true },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("search API error {status}: {text}");
        }

        let body: serde_json::Value = response.json().await?;
        Ok(parse_results(&body, num_results))
    }
}
