//! Code-execution capability bound to a live sandbox.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use weft_providers::sandbox::Sandbox;

use crate::Capability;

pub struct RunCodeCapability {
    sandbox: Arc<dyn Sandbox>,
    /// Running task/output log shared with the owning delegate; feeds the
    /// summary returned to the orchestrator.
    log: Arc<Mutex<String>>,
}

#[derive(Deserialize)]
struct Params {
    #[serde(rename = "type")]
    _kind: CodeTaskKind,
    task: String,
    code: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum CodeTaskKind {
    ReadData,
    WriteCode,
}

impl RunCodeCapability {
    pub fn new(sandbox: Arc<dyn Sandbox>, log: Arc<Mutex<String>>) -> Self {
        Self { sandbox, log }
    }
}

#[async_trait]
impl Capability for RunCodeCapability {
    fn name(&self) -> &str {
        "run-code"
    }

    fn description(&self) -> &str {
        "Run code in the sandbox"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["read-data", "write-code"],
                    "description": "The type of task being performed"
                },
                "task": {
                    "type": "string",
                    "description": "The task to perform"
                },
                "code": {
                    "type": "string",
                    "description": "Python code to run"
                }
            },
            "required": ["type", "task", "code"]
        })
    }

    async fn execute(
        &self,
        _call_id: &str,
        input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let params: Params = serde_json::from_value(input)?;
        debug!(task = %params.task, "run-code");

        let output = self
            .sandbox
            .run_command("python", &["-c".to_string(), params.code])
            .await?
            .combined();

        self.log
            .lock()
            .expect("response log lock poisoned")
            .push_str(&format!(
                "\nTask: {}\nOutput: {}\n",
                params.task, output
            ));

        Ok(json!(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_providers::sandbox::CommandOutput;

    struct CannedSandbox {
        output: String,
    }

    #[async_trait]
    impl Sandbox for CannedSandbox {
        async fn mk_dir(&self, _path: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn run_command(
            &self,
            _cmd: &str,
            _args: &[String],
        ) -> anyhow::Result<CommandOutput> {
            Ok(CommandOutput {
                stdout: self.output.clone(),
                stderr: String::new(),
                exit_code: 0,
            })
        }

        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_appends_task_and_output_to_log() {
        let log = Arc::new(Mutex::new(String::new()));
        let capability = RunCodeCapability::new(
            Arc::new(CannedSandbox {
                output: "rows: 3".into(),
            }),
            Arc::clone(&log),
        );

        let out = capability
            .execute(
                "c1",
                json!({"type": "read-data", "task": "count rows", "code": "print(len(df))"}),
            )
            .await
            .unwrap();

        assert_eq!(out, json!("rows: 3"));
        let log = log.lock().unwrap();
        assert!(log.contains("Task: count rows"));
        assert!(log.contains("Output: rows: 3"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_task_type() {
        let capability = RunCodeCapability::new(
            Arc::new(CannedSandbox {
                output: String::new(),
            }),
            Arc::new(Mutex::new(String::new())),
        );
        let err = capability
            .execute("c1", json!({"type": "dance", "task": "t", "code": "c"}))
            .await;
        assert!(err.is_err());
    }
}
