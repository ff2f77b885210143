//! Web-search capability wrapping the external search provider.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use weft_core::types::SearchResult;
use weft_providers::search::{DEFAULT_NUM_RESULTS, SearchProvider};

use crate::Capability;

pub struct SearchCapability {
    provider: Arc<dyn SearchProvider>,
    default_num_results: usize,
    /// Every result returned this run, in arrival order — the summarizer
    /// reads these after the loop ends.
    collected: Arc<Mutex<Vec<SearchResult>>>,
}

#[derive(Deserialize)]
struct Params {
    query: String,
    #[serde(rename = "numResults", default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    DEFAULT_NUM_RESULTS
}

impl SearchCapability {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        default_num_results: usize,
        collected: Arc<Mutex<Vec<SearchResult>>>,
    ) -> Self {
        Self {
            provider,
            default_num_results,
            collected,
        }
    }
}

#[async_trait]
impl Capability for SearchCapability {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for information, for more complex queries, increase the number of results"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "numResults": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        _call_id: &str,
        input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let params: Params = serde_json::from_value(input)?;
        let num_results = if params.num_results == 0 {
            self.default_num_results
        } else {
            params.num_results
        };

        let results = self.provider.search(&params.query, num_results).await?;
        self.collected
            .lock()
            .expect("source list lock poisoned")
            .extend(results.iter().cloned());

        Ok(serde_json::to_value(results)?)
    }
}
