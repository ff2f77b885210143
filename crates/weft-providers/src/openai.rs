//! OpenAI-compatible Chat Completions provider.
//!
//! Streams `/v1/chat/completions` over SSE; structured output goes through
//! the non-streaming endpoint with a `json_schema` response format.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use weft_core::transcript::{ContentBlock, TranscriptEntry};

use crate::sse::{SseEvent, parse_sse_stream};
use crate::{
    ChunkUsage, CompletionChunk, CompletionRequest, CompletionStream, Credentials, LlmProvider,
    ToolDefinition, ToolUseChunk,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &CompletionRequest, stream: bool) -> OpenAiRequest {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().cloned());

        OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            stream,
            temperature: request.temperature,
            tools: request.tools.clone(),
            parallel_tool_calls: (request.disable_parallel_tool_use
                && request.tools.is_some())
            .then_some(false),
            response_format: None,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn post(
        &self,
        body: &OpenAiRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json");

        if let Credentials::ApiKey { api_key } = credentials {
            builder = builder.header("authorization", format!("Bearer {api_key}"));
        }

        let response = builder.json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {text}");
        }
        Ok(response)
    }
}

// --- request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Accumulates one tool call across streaming deltas.
#[derive(Debug, Clone, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_chunk(self) -> CompletionChunk {
        CompletionChunk {
            tool_use: Some(ToolUseChunk {
                id: self.id,
                name: self.name,
                input_json: self.arguments,
            }),
            ..Default::default()
        }
    }
}

/// Chunk-level stream state: SSE events in, completion chunks out.
struct ChunkState {
    tool_calls: Vec<ToolCallAccumulator>,
    pending: VecDeque<CompletionChunk>,
}

impl ChunkState {
    fn new() -> Self {
        Self {
            tool_calls: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Drain accumulated tool calls into output chunks, tagging the last one
    /// with the stop reason when given.
    fn flush_tool_calls(&mut self, stop_reason: Option<String>) {
        let mut chunks: Vec<CompletionChunk> = self
            .tool_calls
            .drain(..)
            .map(ToolCallAccumulator::into_chunk)
            .collect();
        if let Some(reason) = stop_reason {
            match chunks.last_mut() {
                Some(last) => last.stop_reason = Some(reason),
                None => chunks.push(CompletionChunk {
                    stop_reason: Some(reason),
                    ..Default::default()
                }),
            }
        }
        self.pending.extend(chunks);
    }

    fn ingest(&mut self, event: &SseEvent) -> bool {
        let data = event.data.trim();
        if data == "[DONE]" {
            self.flush_tool_calls(None);
            return true;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                trace!(%e, data, "Skipping unparseable chunk");
                return false;
            }
        };

        if let Some(usage) = chunk.usage {
            self.pending.push_back(CompletionChunk {
                usage: Some(ChunkUsage {
                    input_tokens: Some(usage.prompt_tokens),
                    output_tokens: Some(usage.completion_tokens),
                }),
                ..Default::default()
            });
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return false;
        };

        if let Some(tool_deltas) = choice.delta.tool_calls {
            for tc in tool_deltas {
                while self.tool_calls.len() <= tc.index {
                    self.tool_calls.push(ToolCallAccumulator::default());
                }
                let acc = &mut self.tool_calls[tc.index];
                if let Some(id) = tc.id {
                    acc.id = id;
                }
                if let Some(f) = tc.function {
                    if let Some(name) = f.name {
                        acc.name = name;
                    }
                    if let Some(args) = f.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }
        }

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                self.pending.push_back(CompletionChunk {
                    delta: Some(content),
                    ..Default::default()
                });
            }
        }

        if let Some(reason) = choice.finish_reason {
            if reason == "tool_calls" {
                self.flush_tool_calls(Some(reason));
            } else {
                self.pending.push_back(CompletionChunk {
                    stop_reason: Some(reason),
                    ..Default::default()
                });
            }
        }
        false
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        for entry in transcript {
            match entry {
                TranscriptEntry::User { content, .. } => {
                    let text = join_text(content);
                    if !text.is_empty() {
                        messages.push(json!({ "role": "user", "content": text }));
                    }
                }
                TranscriptEntry::Assistant { content, .. } => {
                    let text = join_text(content);
                    let tool_calls: Vec<serde_json::Value> = content
                        .iter()
                        .filter_map(|block| match block {
                            ContentBlock::ToolUse { id, name, input } => Some(json!({
                                "id": id,
                                "type": "function",
                                "function": {
                                    "name": name,
                                    "arguments": input.to_string(),
                                }
                            })),
                            _ => None,
                        })
                        .collect();

                    let mut msg = json!({ "role": "assistant" });
                    if !text.is_empty() {
                        msg["content"] = json!(text);
                    }
                    if !tool_calls.is_empty() {
                        msg["tool_calls"] = json!(tool_calls);
                    }
                    if msg.get("content").is_some() || msg.get("tool_calls").is_some() {
                        messages.push(msg);
                    }
                }
                TranscriptEntry::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    }));
                }
            }
        }
        messages
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn is_tool_use_stop(&self, stop_reason: &str) -> bool {
        stop_reason == "tool_calls"
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<CompletionStream> {
        let body = self.build_body(request, true);
        debug!(model = %body.model, base_url = %self.base_url, "Streaming chat completion");

        let response = self.post(&body, credentials).await?;
        let sse = parse_sse_stream(response);

        struct StreamState {
            sse: std::pin::Pin<
                Box<dyn futures::Stream<Item = anyhow::Result<SseEvent>> + Send>,
            >,
            chunks: ChunkState,
            done: bool,
        }

        let stream = futures::stream::unfold(
            StreamState {
                sse: Box::pin(sse),
                chunks: ChunkState::new(),
                done: false,
            },
            |mut state| async move {
                loop {
                    if let Some(chunk) = state.chunks.pending.pop_front() {
                        return Some((Ok(chunk), state));
                    }
                    if state.done {
                        return None;
                    }
                    match state.sse.next().await {
                        Some(Ok(event)) => {
                            if state.chunks.ingest(&event) {
                                state.done = true;
                            }
                        }
                        Some(Err(e)) => return Some((Err(e), state)),
                        None => {
                            state.done = true;
                            state.chunks.flush_tool_calls(None);
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    async fn generate_object(
        &self,
        request: &CompletionRequest,
        schema: &serde_json::Value,
        credentials: &Credentials,
    ) -> anyhow::Result<serde_json::Value> {
        let mut body = self.build_body(request, false);
        body.response_format = Some(json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_output",
                "strict": true,
                "schema": schema,
            }
        }));
        debug!(model = %body.model, "Structured-output completion");

        let response = self.post(&body, credentials).await?;
        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("structured output response had no content"))?;

        Ok(serde_json::from_str(&content)?)
    }
}

fn join_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
