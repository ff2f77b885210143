//! External collaborator interfaces consumed by the agent loops.
//!
//! Three seams, each a trait plus one shipped adapter: the LLM inference
//! call ([`LlmProvider`], OpenAI-compatible streaming), the web search
//! provider ([`search::SearchProvider`]), and the remote code-execution
//! sandbox ([`sandbox::SandboxProvider`]).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use weft_core::transcript::TranscriptEntry;

pub mod openai;
pub mod sandbox;
pub mod search;
pub mod sse;

/// Credentials for authenticating with an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "api_key")]
    ApiKey { api_key: String },
    /// No credentials — local gateways and test doubles.
    #[serde(rename = "none")]
    None,
}

/// A tool surface description handed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<serde_json::Value>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub tools: Option<Vec<serde_json::Value>>,
    pub system: Option<String>,
    /// Forbid the model from issuing concurrent tool invocations; the loops
    /// execute calls serially and rely on this for causal event order.
    pub disable_parallel_tool_use: bool,
}

/// A streamed chunk from the LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub delta: Option<String>,
    pub tool_use: Option<ToolUseChunk>,
    pub usage: Option<ChunkUsage>,
    pub stop_reason: Option<String>,
}

/// A complete tool invocation assembled from streaming deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseChunk {
    pub id: String,
    pub name: String,
    pub input_json: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = anyhow::Result<CompletionChunk>> + Send>>;

/// The LLM inference seam. Prompt and tool spec in, chunk stream out.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "openai").
    fn id(&self) -> &str;

    /// Render a loop transcript into provider message format.
    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value>;

    /// Render tool definitions into provider tool format.
    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value>;

    /// Whether a stop reason means "the model wants tool results".
    fn is_tool_use_stop(&self, stop_reason: &str) -> bool;

    /// Stream a chat completion.
    async fn stream(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<CompletionStream>;

    /// Non-streaming generation constrained to a JSON schema. Returns the
    /// parsed object.
    async fn generate_object(
        &self,
        request: &CompletionRequest,
        schema: &serde_json::Value,
        credentials: &Credentials,
    ) -> anyhow::Result<serde_json::Value>;
}
