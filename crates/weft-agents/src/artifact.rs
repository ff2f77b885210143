//! Artifact-writer delegate — streams an authored document as deltas.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use weft_core::config::Config;
use weft_core::markup;
use weft_core::protocol::{StepUpdate, WireEvent};
use weft_core::transcript::TranscriptEntry;
use weft_core::types::{ComponentKind, RunKind, RunStatus, StepData, now_millis};
use weft_core::writer::EventWriter;
use weft_providers::{Credentials, LlmProvider};
use weft_tools::flash_card::FlashCardCapability;
use weft_tools::{Capability, CapabilityTable};

use crate::prompt;
use crate::runtime::{LoopConfig, LoopObserver, run_loop};

/// Writer sub-agent: a bounded generation loop whose prose is forwarded
/// fragment by fragment and accumulated into the returned content.
pub struct ArtifactDelegate {
    provider: Arc<dyn LlmProvider>,
    credentials: Credentials,
    writer: EventWriter,
    config: Arc<Config>,
}

#[derive(Deserialize)]
struct Params {
    title: String,
    description: String,
    plan: String,
}

impl ArtifactDelegate {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        credentials: Credentials,
        writer: EventWriter,
        config: Arc<Config>,
    ) -> Self {
        Self {
            provider,
            credentials,
            writer,
            config,
        }
    }
}

/// Forwards prose immediately, embeds component calls through the markup
/// codec, and keeps the running content for the tool result.
struct ArtifactObserver<'a> {
    writer: &'a EventWriter,
    run_id: &'a str,
    content: String,
}

impl LoopObserver for ArtifactObserver<'_> {
    fn on_text_delta(&mut self, delta: &str) {
        self.content.push_str(delta);
        self.writer
            .write(WireEvent::artifact_delta(self.run_id, delta));
    }

    fn on_capability_call(&mut self, _id: &str, name: &str, input: &serde_json::Value) {
        if name != "flash-card" {
            return;
        }
        let block = markup::encode_component(name, input);
        self.writer
            .write(WireEvent::artifact_delta(self.run_id, &block));
        // The component step is keyed by the run id itself.
        self.writer.write(WireEvent::step_update(
            self.run_id,
            self.run_id,
            RunStatus::Completed,
            StepData::Component {
                component: ComponentKind::FlashCard,
            },
        ));
        self.content.push_str(&block);
    }
}

#[async_trait]
impl Capability for ArtifactDelegate {
    fn name(&self) -> &str {
        "artifact"
    }

    fn description(&self) -> &str {
        "Use the artifact tool when creating reports or summaries of information, \
         you can use the flash-card tool to create flash cards."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The title of the artifact"
                },
                "description": {
                    "type": "string",
                    "description": "The description of the artifact"
                },
                "plan": {
                    "type": "string",
                    "description": "A point-by-point of what needs to be written in the artifact"
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
        let run_id = call_id;
        info!(run_id, title = %params.title, "artifact delegate run");

        self.writer.write(WireEvent::artifact_start(
            run_id,
            &params.title,
            &params.description,
            &params.plan,
        ));
        self.writer
            .write(WireEvent::run_start(run_id, RunKind::AgenticArtifact));

        let writing_id = Uuid::new_v4().to_string();
        self.writer.write(WireEvent::StepUpdate {
            data: StepUpdate {
                run_id: run_id.to_string(),
                step_id: writing_id.clone(),
                status: RunStatus::Pending,
                data: StepData::Writing {
                    content: format!("Writing artifact titled: '{}'", params.title),
                },
                start_datetime: Some(now_millis()),
                end_datetime: None,
            },
        });

        let mut capabilities = CapabilityTable::new();
        capabilities.register(Box::new(FlashCardCapability));

        let loop_config = LoopConfig {
            model: self.config.delegate_model(),
            system: None,
            max_tokens: self.config.max_tokens(),
            temperature: self.config.temperature(),
            max_steps: self.config.artifact_steps(),
        };
        let transcript = vec![TranscriptEntry::user_text(prompt::writer(
            &params.title,
            &params.description,
            &params.plan,
        ))];
        let mut observer = ArtifactObserver {
            writer: &self.writer,
            run_id,
            content: String::new(),
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

        self.writer.write(WireEvent::step_update(
            run_id,
            &writing_id,
            RunStatus::Completed,
            StepData::Writing {
                content: format!("Wrote artifact titled: '{}'", params.title),
            },
        ));
        self.writer
            .write(WireEvent::run_end(run_id, RunStatus::Completed));

        Ok(json!(observer.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, drain_events};

    fn delegate(provider: ScriptedProvider, writer: EventWriter) -> ArtifactDelegate {
        ArtifactDelegate::new(
            Arc::new(provider),
            Credentials::None,
            writer,
            Arc::new(Config::default()),
        )
    }

    fn artifact_deltas(events: &[WireEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                WireEvent::ArtifactDelta { data, .. } => Some(data.delta.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_hello_world_scenario() {
        let provider =
            ScriptedProvider::new(vec![ScriptedProvider::deltas_step(&["Hello ", "World"])]);
        let (writer, mut rx) = EventWriter::channel();
        let delegate = delegate(provider, writer);

        let result = delegate
            .execute(
                "run_1",
                json!({"title": "T", "description": "D", "plan": "P"}),
            )
            .await
            .unwrap();
        assert_eq!(result, json!("Hello World"));

        let events = drain_events(&mut rx);
        match &events[0] {
            WireEvent::ArtifactStart { id, data } => {
                assert_eq!(id, "run_1");
                assert_eq!(data.title, "T");
                assert_eq!(data.description, "D");
                assert_eq!(data.plan, "P");
            }
            other => panic!("expected artifact-start first, got {other:?}"),
        }
        match &events[1] {
            WireEvent::RunStart { data } => assert_eq!(data.kind, RunKind::AgenticArtifact),
            other => panic!("expected run-start, got {other:?}"),
        }
        assert_eq!(artifact_deltas(&events), vec!["Hello ", "World"]);

        // Pending writing step carries a start time; the completed one closes
        // the run out.
        match &events[2] {
            WireEvent::StepUpdate { data } => {
                assert_eq!(data.status, RunStatus::Pending);
                assert!(data.start_datetime.is_some());
                assert!(matches!(data.data, StepData::Writing { .. }));
            }
            other => panic!("expected pending writing step, got {other:?}"),
        }
        match events.last().unwrap() {
            WireEvent::RunEnd { data } => assert_eq!(data.status, RunStatus::Completed),
            other => panic!("expected run-end last, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_flash_card_call_embeds_component_block() {
        let card_input = json!({
            "title": "Capitals",
            "cards": [{"question": "Capital of France?", "answer": "Paris"}]
        });
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::text_then_tool_step(
                "Intro. ",
                vec![("call_f1".to_string(), "flash-card", card_input.clone())],
            ),
            ScriptedProvider::text_step(" Outro."),
        ]);
        let (writer, mut rx) = EventWriter::channel();
        let delegate = delegate(provider, writer);

        let result = delegate
            .execute(
                "run_1",
                json!({"title": "T", "description": "D", "plan": "P"}),
            )
            .await
            .unwrap();

        let content = result.as_str().unwrap();
        assert!(content.starts_with("Intro. "));
        assert!(content.ends_with(" Outro."));
        assert!(content.contains(":::callout {type=\"flash-card\""));

        // The embedded block round-trips through the codec.
        let block_start = content.find(":::callout").unwrap();
        let block_end = content.rfind(":::").unwrap() + 3;
        let decoded = markup::decode_component(&content[block_start..block_end]).unwrap();
        assert_eq!(decoded.kind, "flash-card");
        assert_eq!(decoded.payload, card_input);

        let events = drain_events(&mut rx);
        let component_step = events
            .iter()
            .find_map(|e| match e {
                WireEvent::StepUpdate { data }
                    if matches!(data.data, StepData::Component { .. }) =>
                {
                    Some(data.clone())
                }
                _ => None,
            })
            .expect("component step present");
        assert_eq!(component_step.step_id, "run_1");
        assert_eq!(component_step.status, RunStatus::Completed);

        // The block was also forwarded as a delta, and the deltas concatenate
        // to the returned content.
        assert_eq!(artifact_deltas(&events).concat(), content);
    }

    #[tokio::test]
    async fn test_rejects_incomplete_input() {
        let provider = ScriptedProvider::new(vec![]);
        let (writer, _rx) = EventWriter::channel();
        let delegate = delegate(provider, writer);
        assert!(
            delegate
                .execute("run_1", json!({"title": "only"}))
                .await
                .is_err()
        );
    }
}
