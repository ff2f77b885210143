//! Top-level orchestrator loop — selects and sequences delegate agents.

use std::sync::Arc;

use tracing::info;

use weft_core::config::Config;
use weft_core::protocol::WireEvent;
use weft_core::transcript::TranscriptEntry;
use weft_core::types::RemoteFile;
use weft_core::writer::EventWriter;
use weft_providers::sandbox::SandboxProvider;
use weft_providers::search::SearchProvider;
use weft_providers::{Credentials, LlmProvider};
use weft_tools::CapabilityTable;

use crate::artifact::ArtifactDelegate;
use crate::data_analysis::DataAnalysisDelegate;
use crate::prompt;
use crate::runtime::{LoopConfig, LoopObserver, run_loop};
use crate::search::SearchDelegate;

/// The conversational loop. Exactly three callable delegates; at most one
/// executes at a time — the loop runs tool calls serially and the provider
/// is told not to parallelize them.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    credentials: Credentials,
    config: Arc<Config>,
    writer: EventWriter,
    files: Vec<RemoteFile>,
    capabilities: CapabilityTable,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        credentials: Credentials,
        config: Arc<Config>,
        writer: EventWriter,
        search: Arc<dyn SearchProvider>,
        sandbox: Arc<dyn SandboxProvider>,
        files: Vec<RemoteFile>,
    ) -> Self {
        let mut capabilities = CapabilityTable::new();
        capabilities.register(Box::new(SearchDelegate::new(
            Arc::clone(&provider),
            credentials.clone(),
            search,
            writer.clone(),
            Arc::clone(&config),
        )));
        capabilities.register(Box::new(ArtifactDelegate::new(
            Arc::clone(&provider),
            credentials.clone(),
            writer.clone(),
            Arc::clone(&config),
        )));
        capabilities.register(Box::new(DataAnalysisDelegate::new(
            Arc::clone(&provider),
            credentials.clone(),
            Arc::clone(&sandbox),
            files.clone(),
            writer.clone(),
            Arc::clone(&config),
        )));

        Self {
            provider,
            credentials,
            config,
            writer,
            files,
            capabilities,
        }
    }

    /// Run one conversational turn to completion and return the final answer.
    ///
    /// The orchestrator's own prose streams out as `text-delta` events,
    /// interleaved with whatever the currently-executing delegate emits.
    pub async fn run_turn(&self, transcript: Vec<TranscriptEntry>) -> anyhow::Result<String> {
        info!(
            tools = ?self.capabilities.names(),
            files = self.files.len(),
            "orchestrator turn"
        );

        let loop_config = LoopConfig {
            model: self.config.orchestrator_model(),
            system: Some(prompt::orchestrator_system(&self.files)),
            max_tokens: self.config.max_tokens(),
            temperature: self.config.temperature(),
            max_steps: self.config.orchestrator_steps(),
        };
        let mut observer = ForwardText {
            writer: &self.writer,
        };
        let outcome = run_loop(
            self.provider.as_ref(),
            &self.credentials,
            &loop_config,
            &self.capabilities,
            transcript,
            &mut observer,
        )
        .await?;

        Ok(outcome.final_text)
    }
}

/// Streams orchestrator prose onto the shared channel as it is generated.
struct ForwardText<'a> {
    writer: &'a EventWriter,
}

impl LoopObserver for ForwardText<'_> {
    fn on_text_delta(&mut self, delta: &str) {
        self.writer.write(WireEvent::TextDelta {
            delta: delta.to_string(),
        });
    }
}
