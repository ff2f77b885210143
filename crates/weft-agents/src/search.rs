//! Search delegate — bounded web research reported step by step.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use weft_core::config::Config;
use weft_core::protocol::WireEvent;
use weft_core::transcript::TranscriptEntry;
use weft_core::types::{RunKind, RunStatus, SearchResult, StepData};
use weft_core::writer::EventWriter;
use weft_providers::search::SearchProvider;
use weft_providers::{CompletionRequest, Credentials, LlmProvider};
use weft_tools::date::DateCapability;
use weft_tools::search::SearchCapability;
use weft_tools::{Capability, CapabilityTable};

use crate::prompt;
use crate::runtime::{LoopConfig, LoopObserver, run_loop};

/// Researcher sub-agent: bounded reasoning over search + date capabilities,
/// then a structured summary with relevant-source attribution.
pub struct SearchDelegate {
    provider: Arc<dyn LlmProvider>,
    credentials: Credentials,
    search: Arc<dyn SearchProvider>,
    writer: EventWriter,
    config: Arc<Config>,
}

#[derive(Deserialize)]
struct Params {
    query: String,
}

#[derive(Deserialize)]
struct Summary {
    text: String,
    #[serde(rename = "relevantSources")]
    relevant_sources: Vec<String>,
}

impl SearchDelegate {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        credentials: Credentials,
        search: Arc<dyn SearchProvider>,
        writer: EventWriter,
        config: Arc<Config>,
    ) -> Self {
        Self {
            provider,
            credentials,
            search,
            writer,
            config,
        }
    }

    /// Summarize collected sources through a schema-constrained generation.
    async fn summarize(&self, sources: &[SearchResult]) -> anyhow::Result<Summary> {
        let sources_json = serde_json::to_string(sources)?;
        let transcript = vec![TranscriptEntry::user_text(prompt::summarizer(
            &sources_json,
        ))];
        let request = CompletionRequest {
            model: self.config.delegate_model(),
            messages: self.provider.format_messages(&transcript),
            max_tokens: self.config.max_tokens(),
            temperature: Some(0.0),
            tools: None,
            system: None,
            disable_parallel_tool_use: false,
        };
        let schema = json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "relevantSources": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "The sources that are relevant to the information"
                }
            },
            "required": ["text", "relevantSources"],
            "additionalProperties": false
        });
        let object = self
            .provider
            .generate_object(&request, &schema, &self.credentials)
            .await?;
        Ok(serde_json::from_value(object)?)
    }
}

/// Turns inner capability activity into pending/completed step upserts.
struct SearchObserver<'a> {
    writer: &'a EventWriter,
    run_id: &'a str,
}

impl LoopObserver for SearchObserver<'_> {
    fn on_capability_call(&mut self, id: &str, name: &str, input: &serde_json::Value) {
        if name == "search" {
            let query = input
                .get("query")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            self.writer.write(WireEvent::step_update(
                self.run_id,
                id,
                RunStatus::Pending,
                StepData::Search {
                    query,
                    results: vec![],
                },
            ));
        }
    }

    fn on_capability_result(
        &mut self,
        id: &str,
        name: &str,
        input: &serde_json::Value,
        output: &serde_json::Value,
    ) {
        match name {
            "search" => {
                let query = input
                    .get("query")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let results: Vec<SearchResult> =
                    serde_json::from_value(output.clone()).unwrap_or_default();
                self.writer.write(WireEvent::step_update(
                    self.run_id,
                    id,
                    RunStatus::Completed,
                    StepData::Search { query, results },
                ));
            }
            "date" => {
                let date = output.as_str().unwrap_or_default().to_string();
                self.writer.write(WireEvent::step_update(
                    self.run_id,
                    id,
                    RunStatus::Completed,
                    StepData::Date { date },
                ));
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Capability for SearchDelegate {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for information"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        call_id: &str,
        input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let params: Params = serde_json::from_value(input)?;
        let run_id = call_id;
        info!(run_id, query = %params.query, "search delegate run");

        self.writer
            .write(WireEvent::run_start(run_id, RunKind::AgenticSearch));

        let collected = Arc::new(Mutex::new(Vec::new()));
        let mut capabilities = CapabilityTable::new();
        capabilities.register(Box::new(SearchCapability::new(
            Arc::clone(&self.search),
            self.config.search_num_results(),
            Arc::clone(&collected),
        )));
        capabilities.register(Box::new(DateCapability));

        let loop_config = LoopConfig {
            model: self.config.delegate_model(),
            system: None,
            max_tokens: self.config.max_tokens(),
            temperature: None,
            max_steps: self.config.search_steps(),
        };
        let transcript = vec![TranscriptEntry::user_text(prompt::researcher(
            &params.query,
        ))];
        let mut observer = SearchObserver {
            writer: &self.writer,
            run_id,
        };
        run_loop(
            self.provider.as_ref(),
            &self.credentials,
            &loop_config,
            &capabilities,
            transcript,
            &mut observer,
        )
        .await?;

        // Summary step: pending with empty text, then the structured result.
        let summary_id = Uuid::new_v4().to_string();
        self.writer.write(WireEvent::step_update(
            run_id,
            &summary_id,
            RunStatus::Pending,
            StepData::Text { text: String::new() },
        ));

        let sources = collected.lock().expect("source list lock poisoned").clone();
        let summary = self.summarize(&sources).await?;

        for (index, url) in summary.relevant_sources.iter().enumerate() {
            self.writer.write(WireEvent::SourceUrl {
                source_id: format!("source-{index}"),
                url: url.clone(),
            });
        }
        self.writer.write(WireEvent::step_update(
            run_id,
            &summary_id,
            RunStatus::Completed,
            StepData::Text {
                text: summary.text.clone(),
            },
        ));
        self.writer
            .write(WireEvent::run_end(run_id, RunStatus::Completed));

        Ok(json!(format!(
            "Write a detailed report of the following information:{}",
            summary.text
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, StubSearch, drain_events};

    fn scenario_result() -> SearchResult {
        SearchResult {
            url: "https://a.co".into(),
            title: "France".into(),
            text: "Paris is the capital".into(),
        }
    }

    fn delegate(
        provider: ScriptedProvider,
        search: StubSearch,
        writer: EventWriter,
    ) -> SearchDelegate {
        SearchDelegate::new(
            Arc::new(provider),
            Credentials::None,
            Arc::new(search),
            writer,
            Arc::new(Config::default()),
        )
    }

    #[tokio::test]
    async fn test_capital_of_france_scenario() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_step(vec![(
                "call_s1".to_string(),
                "search",
                json!({"query": "capital of France"}),
            )]),
            ScriptedProvider::text_step("found it"),
        ])
        .with_objects(vec![json!({
            "text": "Paris is the capital of France.",
            "relevantSources": ["https://a.co"]
        })]);
        let (writer, mut rx) = EventWriter::channel();
        let delegate = delegate(provider, StubSearch::new(vec![scenario_result()]), writer);

        let result = delegate
            .execute("run_1", json!({"query": "capital of France"}))
            .await
            .unwrap();
        assert_eq!(
            result,
            json!(
                "Write a detailed report of the following information:Paris is the capital of France."
            )
        );

        let events = drain_events(&mut rx);
        // run-start, pending search, completed search, pending text,
        // source-url, completed text, run-end.
        assert_eq!(events.len(), 7);

        match &events[0] {
            WireEvent::RunStart { data } => {
                assert_eq!(data.id, "run_1");
                assert_eq!(data.kind, RunKind::AgenticSearch);
            }
            other => panic!("expected run-start, got {other:?}"),
        }
        match &events[1] {
            WireEvent::StepUpdate { data } => {
                assert_eq!(data.status, RunStatus::Pending);
                assert_eq!(
                    data.data,
                    StepData::Search {
                        query: "capital of France".into(),
                        results: vec![],
                    }
                );
            }
            other => panic!("expected pending search step, got {other:?}"),
        }
        match &events[2] {
            WireEvent::StepUpdate { data } => {
                assert_eq!(data.step_id, "call_s1");
                assert_eq!(data.status, RunStatus::Completed);
                assert_eq!(
                    data.data,
                    StepData::Search {
                        query: "capital of France".into(),
                        results: vec![scenario_result()],
                    }
                );
            }
            other => panic!("expected completed search step, got {other:?}"),
        }
        match &events[4] {
            WireEvent::SourceUrl { source_id, url } => {
                assert_eq!(source_id, "source-0");
                assert_eq!(url, "https://a.co");
            }
            other => panic!("expected source-url, got {other:?}"),
        }
        match &events[6] {
            WireEvent::RunEnd { data } => {
                assert_eq!(data.id, "run_1");
                assert_eq!(data.status, RunStatus::Completed);
            }
            other => panic!("expected run-end, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_date_capability_reports_completed_step() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::tool_step(vec![("call_d1".to_string(), "date", json!({}))]),
            ScriptedProvider::text_step("done"),
        ])
        .with_objects(vec![json!({"text": "t", "relevantSources": []})]);
        let (writer, mut rx) = EventWriter::channel();
        let delegate = delegate(provider, StubSearch::new(vec![]), writer);

        delegate
            .execute("run_1", json!({"query": "what day is it"}))
            .await
            .unwrap();

        let events = drain_events(&mut rx);
        let date_step = events.iter().find_map(|e| match e {
            WireEvent::StepUpdate { data } if data.step_id == "call_d1" => Some(data.clone()),
            _ => None,
        });
        let step = date_step.expect("date step present");
        assert_eq!(step.status, RunStatus::Completed);
        assert!(matches!(step.data, StepData::Date { .. }));
    }

    #[tokio::test]
    async fn test_summarizer_failure_leaves_run_open() {
        // No scripted object: the summarizer call fails after the loop.
        let provider = ScriptedProvider::new(vec![ScriptedProvider::text_step("nothing to do")]);
        let (writer, mut rx) = EventWriter::channel();
        let delegate = delegate(provider, StubSearch::new(vec![]), writer);

        let err = delegate
            .execute("run_1", json!({"query": "q"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scripted object"));

        let events = drain_events(&mut rx);
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, WireEvent::RunEnd { .. })),
            "failed run must not emit run-end"
        );
    }

    #[tokio::test]
    async fn test_rejects_missing_query() {
        let provider = ScriptedProvider::new(vec![]);
        let (writer, _rx) = EventWriter::channel();
        let delegate = delegate(provider, StubSearch::new(vec![]), writer);
        assert!(delegate.execute("run_1", json!({})).await.is_err());
    }
}
