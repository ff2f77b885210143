//! The bounded loop — stream one completion per step, execute tool calls
//! serially, stop at the cap or when the model is done.

use chrono::Utc;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::debug;

use weft_core::transcript::{ContentBlock, TranscriptEntry};
use weft_providers::{CompletionRequest, Credentials, LlmProvider, ToolUseChunk};
use weft_tools::CapabilityTable;

/// Configuration for one bounded loop. The step budget is a hard cap on
/// reasoning iterations (completions), not on tool calls.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub model: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub max_steps: u32,
}

/// What a finished loop hands back to its caller.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Assistant text of the terminal step; empty when the loop was cut off
    /// by the cap mid-tool-use.
    pub final_text: String,
    pub steps_used: u32,
}

/// Synchronous hooks into loop progress. Event emission through the writer
/// never blocks, so no async is needed here.
pub trait LoopObserver: Send {
    fn on_text_delta(&mut self, _delta: &str) {}

    /// A capability is about to execute.
    fn on_capability_call(&mut self, _id: &str, _name: &str, _input: &serde_json::Value) {}

    /// A capability finished executing.
    fn on_capability_result(
        &mut self,
        _id: &str,
        _name: &str,
        _input: &serde_json::Value,
        _output: &serde_json::Value,
    ) {
    }
}

/// Observer that ignores everything.
pub struct NullObserver;

impl LoopObserver for NullObserver {}

/// Drive a bounded reasoning loop to completion.
///
/// Every external call is a suspension point the loop blocks on before
/// issuing its next event, so observer callbacks fire in true causal order.
/// Provider and capability failures propagate unhandled — the caller's run
/// bookkeeping is left as-is on error.
pub async fn run_loop(
    provider: &dyn LlmProvider,
    credentials: &Credentials,
    config: &LoopConfig,
    capabilities: &CapabilityTable,
    mut transcript: Vec<TranscriptEntry>,
    observer: &mut dyn LoopObserver,
) -> anyhow::Result<LoopOutcome> {
    let mut final_text = String::new();
    let mut steps_used = 0;

    for step in 0..config.max_steps {
        steps_used = step + 1;
        debug!(step, model = %config.model, "loop step");

        let tools = if capabilities.is_empty() {
            None
        } else {
            Some(provider.format_tools(&capabilities.to_definitions()))
        };

        let request = CompletionRequest {
            model: config.model.clone(),
            messages: provider.format_messages(&transcript),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            tools,
            system: config.system.clone(),
            disable_parallel_tool_use: true,
        };

        let stream = provider.stream(&request, credentials).await?;
        let mut stream = std::pin::pin!(stream);

        let mut response_text = String::new();
        let mut tool_uses: Vec<ToolUseChunk> = Vec::new();
        let mut stop_reason: Option<String> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.delta {
                response_text.push_str(&delta);
                observer.on_text_delta(&delta);
            }
            if let Some(tool_use) = chunk.tool_use {
                tool_uses.push(tool_use);
            }
            if let Some(reason) = chunk.stop_reason {
                stop_reason = Some(reason);
            }
        }

        let mut content: Vec<ContentBlock> = Vec::new();
        if !response_text.is_empty() {
            content.push(ContentBlock::Text {
                text: response_text.clone(),
            });
        }
        for tool_use in &tool_uses {
            content.push(ContentBlock::ToolUse {
                id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                input: serde_json::from_str(&tool_use.input_json).unwrap_or(json!({})),
            });
        }
        transcript.push(TranscriptEntry::Assistant {
            content,
            timestamp: Utc::now(),
        });

        let wants_tools = stop_reason
            .as_deref()
            .is_some_and(|r| provider.is_tool_use_stop(r));
        if !wants_tools || tool_uses.is_empty() {
            final_text = response_text;
            break;
        }

        // Serial execution — at most one capability runs at a time, so the
        // events it causes land on the stream in invocation order.
        for tool_use in tool_uses {
            let input: serde_json::Value =
                serde_json::from_str(&tool_use.input_json).unwrap_or(json!({}));
            let capability = capabilities
                .get(&tool_use.name)
                .ok_or_else(|| anyhow::anyhow!("unknown capability: {}", tool_use.name))?;

            debug!(capability = %tool_use.name, id = %tool_use.id, "executing capability");
            observer.on_capability_call(&tool_use.id, &tool_use.name, &input);

            let output = capability.execute(&tool_use.id, input.clone()).await?;
            observer.on_capability_result(&tool_use.id, &tool_use.name, &input, &output);

            transcript.push(TranscriptEntry::ToolResult {
                tool_use_id: tool_use.id,
                tool: tool_use.name,
                content: tool_result_text(&output),
                is_error: false,
                timestamp: Utc::now(),
            });
        }
    }

    Ok(LoopOutcome {
        final_text,
        steps_used,
    })
}

/// Tool output as transcript text: strings verbatim, everything else JSON.
fn tool_result_text(output: &serde_json::Value) -> String {
    match output {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
