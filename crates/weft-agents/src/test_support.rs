//! Scripted collaborators for agent loop tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use weft_core::transcript::{ContentBlock, TranscriptEntry};
use weft_core::types::SearchResult;
use weft_providers::sandbox::{CommandOutput, Sandbox, SandboxProvider, SandboxSpec};
use weft_providers::search::SearchProvider;
use weft_providers::{
    CompletionChunk, CompletionRequest, CompletionStream, Credentials, LlmProvider,
    ToolDefinition, ToolUseChunk,
};

/// An [`LlmProvider`] that replays pre-scripted completion steps.
///
/// Each call to `stream` pops the next step; when the script runs out the
/// model "finishes" with an empty terminal step. `generate_object` pops from
/// a separate object script.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Vec<CompletionChunk>>>,
    objects: Mutex<VecDeque<serde_json::Value>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Vec<CompletionChunk>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            objects: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_objects(self, objects: Vec<serde_json::Value>) -> Self {
        *self.objects.lock().unwrap() = objects.into();
        self
    }

    /// A step that streams one text delta per item and stops.
    pub fn text_step(text: &str) -> Vec<CompletionChunk> {
        vec![
            CompletionChunk {
                delta: Some(text.to_string()),
                ..Default::default()
            },
            CompletionChunk {
                stop_reason: Some("stop".into()),
                ..Default::default()
            },
        ]
    }

    /// A step that streams several text deltas and stops.
    pub fn deltas_step(deltas: &[&str]) -> Vec<CompletionChunk> {
        let mut chunks: Vec<CompletionChunk> = deltas
            .iter()
            .map(|d| CompletionChunk {
                delta: Some((*d).to_string()),
                ..Default::default()
            })
            .collect();
        chunks.push(CompletionChunk {
            stop_reason: Some("stop".into()),
            ..Default::default()
        });
        chunks
    }

    /// A step that requests the given tool calls.
    pub fn tool_step(calls: Vec<(String, &str, serde_json::Value)>) -> Vec<CompletionChunk> {
        let last = calls.len().saturating_sub(1);
        calls
            .into_iter()
            .enumerate()
            .map(|(i, (id, name, input))| CompletionChunk {
                tool_use: Some(ToolUseChunk {
                    id,
                    name: name.to_string(),
                    input_json: input.to_string(),
                }),
                stop_reason: (i == last).then(|| "tool_calls".to_string()),
                ..Default::default()
            })
            .collect()
    }

    /// A step that streams text and then requests tool calls.
    pub fn text_then_tool_step(
        text: &str,
        calls: Vec<(String, &str, serde_json::Value)>,
    ) -> Vec<CompletionChunk> {
        let mut chunks = vec![CompletionChunk {
            delta: Some(text.to_string()),
            ..Default::default()
        }];
        chunks.extend(Self::tool_step(calls));
        chunks
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        transcript
            .iter()
            .map(|entry| match entry {
                TranscriptEntry::User { content, .. } => {
                    json!({"role": "user", "content": text_of(content)})
                }
                TranscriptEntry::Assistant { content, .. } => {
                    json!({"role": "assistant", "content": text_of(content)})
                }
                TranscriptEntry::ToolResult { content, .. } => {
                    json!({"role": "tool", "content": content})
                }
            })
            .collect()
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools.iter().map(|t| json!({"name": t.name})).collect()
    }

    fn is_tool_use_stop(&self, stop_reason: &str) -> bool {
        stop_reason == "tool_calls"
    }

    async fn stream(
        &self,
        _request: &CompletionRequest,
        _credentials: &Credentials,
    ) -> anyhow::Result<CompletionStream> {
        let chunks = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![CompletionChunk {
                stop_reason: Some("stop".into()),
                ..Default::default()
            }]);
        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok::<_, anyhow::Error>),
        )))
    }

    async fn generate_object(
        &self,
        _request: &CompletionRequest,
        _schema: &serde_json::Value,
        _credentials: &Credentials,
    ) -> anyhow::Result<serde_json::Value> {
        self.objects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted object left"))
    }
}

fn text_of(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A [`SearchProvider`] returning a fixed result list.
pub struct StubSearch {
    pub results: Vec<SearchResult>,
    pub calls: AtomicUsize,
}

impl StubSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, _query: &str, _num_results: usize) -> anyhow::Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

/// A [`Sandbox`] that records every command and counts `stop` calls.
pub struct RecordingSandbox {
    pub commands: Mutex<Vec<(String, Vec<String>)>>,
    pub stop_calls: AtomicUsize,
    /// Combined output returned for python invocations.
    pub python_output: String,
    /// When set, python invocations fail (for release-on-error paths).
    pub fail_python: bool,
}

impl RecordingSandbox {
    pub fn new(python_output: &str) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            stop_calls: AtomicUsize::new(0),
            python_output: python_output.to_string(),
            fail_python: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_python: true,
            ..Self::new("")
        }
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }
}

#[async_trait]
impl Sandbox for RecordingSandbox {
    async fn mk_dir(&self, path: &str) -> anyhow::Result<()> {
        self.commands
            .lock()
            .unwrap()
            .push(("mkdir".into(), vec![path.to_string()]));
        Ok(())
    }

    async fn run_command(&self, cmd: &str, args: &[String]) -> anyhow::Result<CommandOutput> {
        self.commands
            .lock()
            .unwrap()
            .push((cmd.to_string(), args.to_vec()));
        if cmd == "python" && self.fail_python {
            anyhow::bail!("sandbox command failed: python");
        }
        Ok(CommandOutput {
            stdout: if cmd == "python" {
                self.python_output.clone()
            } else {
                String::new()
            },
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one pre-built [`RecordingSandbox`].
pub struct RecordingSandboxProvider {
    pub sandbox: Arc<RecordingSandbox>,
}

impl RecordingSandboxProvider {
    pub fn new(sandbox: RecordingSandbox) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
        }
    }
}

#[async_trait]
impl SandboxProvider for RecordingSandboxProvider {
    async fn create(&self, _spec: SandboxSpec) -> anyhow::Result<Arc<dyn Sandbox>> {
        Ok(Arc::clone(&self.sandbox) as Arc<dyn Sandbox>)
    }
}

/// Drain every event currently buffered on the receiver.
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<weft_core::protocol::WireEvent>,
) -> Vec<weft_core::protocol::WireEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
