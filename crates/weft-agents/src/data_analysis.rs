//! Data-analysis delegate — sandboxed code execution over attached files.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use weft_core::config::Config;
use weft_core::protocol::WireEvent;
use weft_core::transcript::TranscriptEntry;
use weft_core::types::{RemoteFile, RunKind, RunStatus, StepData};
use weft_core::writer::EventWriter;
use weft_providers::sandbox::{SandboxProvider, SandboxSpec, with_sandbox};
use weft_providers::{Credentials, LlmProvider};
use weft_tools::run_code::RunCodeCapability;
use weft_tools::{Capability, CapabilityTable};

use crate::prompt;
use crate::runtime::{LoopConfig, LoopObserver, run_loop};

/// Analyst sub-agent: acquires a time-boxed sandbox, stages the attached
/// files into it, and drives a bounded run-code loop. The sandbox is
/// released on every exit path.
pub struct DataAnalysisDelegate {
    provider: Arc<dyn LlmProvider>,
    credentials: Credentials,
    sandbox_provider: Arc<dyn SandboxProvider>,
    files: Vec<RemoteFile>,
    writer: EventWriter,
    config: Arc<Config>,
}

#[derive(Deserialize)]
struct Params {
    title: String,
    description: String,
    plan: String,
}

impl DataAnalysisDelegate {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        credentials: Credentials,
        sandbox_provider: Arc<dyn SandboxProvider>,
        files: Vec<RemoteFile>,
        writer: EventWriter,
        config: Arc<Config>,
    ) -> Self {
        Self {
            provider,
            credentials,
            sandbox_provider,
            files,
            writer,
            config,
        }
    }

    fn summary(&self, response: &str) -> String {
        let listing = self
            .files
            .iter()
            .map(|f| format!("[{}]({})", f.filename, f.url))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "The files analyzed are:\n{listing}\n\
             The following is the output of the code for each task:\n{response}\n\
             Return tabular data in table markdown format.\n\
             Return any other relevant information in markdown format.\n\n\
             Reuse the files analysed should there be follow up questions."
        )
    }
}

/// Reports every run-code invocation as a pending/completed code step pair.
struct AnalysisObserver<'a> {
    writer: &'a EventWriter,
    run_id: &'a str,
}

impl AnalysisObserver<'_> {
    fn task_and_code(input: &serde_json::Value) -> (String, String) {
        let field = |name: &str| {
            input
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        (field("task"), field("code"))
    }
}

impl LoopObserver for AnalysisObserver<'_> {
    fn on_capability_call(&mut self, id: &str, name: &str, input: &serde_json::Value) {
        if name != "run-code" {
            return;
        }
        let (task, code) = Self::task_and_code(input);
        self.writer.write(WireEvent::step_update(
            self.run_id,
            id,
            RunStatus::Pending,
            StepData::Code {
                task,
                code,
                output: None,
            },
        ));
    }

    fn on_capability_result(
        &mut self,
        id: &str,
        name: &str,
        input: &serde_json::Value,
        output: &serde_json::Value,
    ) {
        if name != "run-code" {
            return;
        }
        let (task, code) = Self::task_and_code(input);
        self.writer.write(WireEvent::step_update(
            self.run_id,
            id,
            RunStatus::Completed,
            StepData::Code {
                task,
                code,
                output: Some(output.as_str().unwrap_or_default().to_string()),
            },
        ));
    }
}

#[async_trait]
impl Capability for DataAnalysisDelegate {
    fn name(&self) -> &str {
        "data-analysis"
    }

    fn description(&self) -> &str {
        "Analyze CSV, Excel, or JSON data"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The title of the data analysis"
                },
                "description": {
                    "type": "string",
                    "description": "The description of the data analysis"
                },
                "plan": {
                    "type": "string",
                    "description": "The step-by-step plan of the data analysis"
                }
            },
            "required": ["title", "description", "plan"]
        })
    }

    async fn execute(
        &self,
        call_id: &str,
        input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let params: Params = serde_json::from_value(input)?;
        let run_id = call_id.to_string();
        info!(%run_id, title = %params.title, "data-analysis delegate run");

        self.writer
            .write(WireEvent::run_start(&run_id, RunKind::AgenticDataAnalysis));

        let create_id = Uuid::new_v4().to_string();
        self.writer.write(WireEvent::step_update(
            &run_id,
            &create_id,
            RunStatus::Pending,
            StepData::Text {
                text: "Starting sandbox...".into(),
            },
        ));

        let spec = SandboxSpec {
            runtime: self.config.sandbox_runtime(),
            timeout: self.config.sandbox_timeout(),
        };

        let writer = self.writer.clone();
        let provider = Arc::clone(&self.provider);
        let credentials = self.credentials.clone();
        let config = Arc::clone(&self.config);
        let files = self.files.clone();
        let body_run_id = run_id.clone();

        let response = with_sandbox(self.sandbox_provider.as_ref(), spec, |sandbox| {
            async move {
                writer.write(WireEvent::step_update(
                    &body_run_id,
                    &create_id,
                    RunStatus::Completed,
                    StepData::Text {
                        text: "Sandbox created".into(),
                    },
                ));

                let file_paths: Vec<String> = files
                    .iter()
                    .map(|f| format!("./data/{}", f.filename))
                    .collect();

                if !files.is_empty() {
                    let prep_id = Uuid::new_v4().to_string();
                    writer.write(WireEvent::step_update(
                        &body_run_id,
                        &prep_id,
                        RunStatus::Pending,
                        StepData::Text {
                            text: "Preparing workspace...".into(),
                        },
                    ));
                    sandbox.mk_dir("data").await?;
                    sandbox.mk_dir("results").await?;
                    sandbox
                        .run_command("pip", &["install".to_string(), "pandas".to_string()])
                        .await?;
                    writer.write(WireEvent::step_update(
                        &body_run_id,
                        &prep_id,
                        RunStatus::Completed,
                        StepData::Text {
                            text: "Workspace ready".into(),
                        },
                    ));

                    let download_id = Uuid::new_v4().to_string();
                    writer.write(WireEvent::step_update(
                        &body_run_id,
                        &download_id,
                        RunStatus::Pending,
                        StepData::Text {
                            text: "Downloading files...".into(),
                        },
                    ));
                    // The one place with genuinely concurrent I/O; files have
                    // no ordering requirement among themselves.
                    let downloads = files.iter().zip(&file_paths).map(|(file, dest)| {
                        let sandbox = Arc::clone(&sandbox);
                        let dest = dest.clone();
                        let url = file.url.clone();
                        async move {
                            sandbox
                                .run_command("curl", &["-o".to_string(), dest, url])
                                .await?;
                            Ok::<_, anyhow::Error>(())
                        }
                    });
                    futures::future::try_join_all(downloads).await?;
                    writer.write(WireEvent::step_update(
                        &body_run_id,
                        &download_id,
                        RunStatus::Completed,
                        StepData::Text {
                            text: "Files downloaded".into(),
                        },
                    ));
                }

                let response_log = Arc::new(Mutex::new(String::new()));
                let mut capabilities = CapabilityTable::new();
                capabilities.register(Box::new(RunCodeCapability::new(
                    Arc::clone(&sandbox),
                    Arc::clone(&response_log),
                )));

                let loop_config = LoopConfig {
                    model: config.delegate_model(),
                    system: None,
                    max_tokens: config.max_tokens(),
                    temperature: config.temperature(),
                    max_steps: config.analysis_steps(),
                };
                let transcript = vec![TranscriptEntry::user_text(prompt::analyst(
                    &params.title,
                    &params.description,
                    &params.plan,
                    &file_paths,
                ))];
                let mut observer = AnalysisObserver {
                    writer: &writer,
                    run_id: &body_run_id,
                };
                run_loop(
                    provider.as_ref(),
                    &credentials,
                    &loop_config,
                    &capabilities,
                    transcript,
                    &mut observer,
                )
                .await?;

                let log = response_log
                    .lock()
                    .expect("response log lock poisoned")
                    .clone();
                Ok(log)
            }
        })
        .await?;

        self.writer
            .write(WireEvent::run_end(&run_id, RunStatus::Completed));

        Ok(json!(self.summary(&response)))
    }
}
