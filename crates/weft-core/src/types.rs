//! Run/step domain model shared by the delegate agents and the client reducer.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Epoch milliseconds, the timestamp unit used on the wire.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which delegate produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunKind {
    AgenticSearch,
    AgenticCode,
    AgenticDataAnalysis,
    AgenticArtifact,
}

/// Lifecycle status shared by runs and steps.
///
/// Transitions go pending -> completed or pending -> error, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Pending,
    Completed,
    Error,
}

/// One delegation episode. Created by a single run-start event; `steps` fill
/// in by upsert as the delegate reports progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RunKind,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<i64>,
    pub steps: HashMap<String, Step>,
}

impl Run {
    /// A freshly started run, as serialized into the run-start event.
    pub fn started(id: impl Into<String>, kind: RunKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: RunStatus::Pending,
            start_datetime: Some(now_millis()),
            end_datetime: None,
            steps: HashMap::new(),
        }
    }
}

/// One reported unit of sub-progress within a run, upserted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub status: RunStatus,
    #[serde(flatten)]
    pub data: StepData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<i64>,
}

/// Tagged step payload — one variant per step kind, so consumers match
/// exhaustively instead of casting on a sibling discriminator.
///
/// Serialized adjacently tagged: the wire carries sibling `type` and `data`
/// fields inside the step-update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum StepData {
    Search {
        query: String,
        results: Vec<SearchResult>,
    },
    Text {
        text: String,
    },
    Image {
        image: String,
    },
    Code {
        task: String,
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Date {
        date: String,
    },
    Writing {
        content: String,
    },
    Component {
        component: ComponentKind,
    },
    DataAnalysis {
        text: String,
    },
}

impl StepData {
    /// The step kind as it appears in the wire `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            StepData::Search { .. } => "search",
            StepData::Text { .. } => "text",
            StepData::Image { .. } => "image",
            StepData::Code { .. } => "code",
            StepData::Date { .. } => "date",
            StepData::Writing { .. } => "writing",
            StepData::Component { .. } => "component",
            StepData::DataAnalysis { .. } => "data-analysis",
        }
    }
}

/// Embeddable component produced inside an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    FlashCard,
}

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// A remote file reference extracted from conversation attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    pub filename: String,
    pub url: String,
}

/// Flash card content as produced by the artifact delegate's inner tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashCard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashCardSet {
    pub title: String,
    pub cards: Vec<FlashCard>,
}

/// An authored document, accumulated client-side from artifact deltas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactBody {
    pub title: String,
    pub description: String,
    pub plan: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(RunKind::AgenticSearch).unwrap(),
            "agentic-search"
        );
        assert_eq!(
            serde_json::to_value(RunKind::AgenticDataAnalysis).unwrap(),
            "agentic-data-analysis"
        );
    }

    #[test]
    fn test_step_data_adjacent_tagging() {
        let data = StepData::Search {
            query: "rust".into(),
            results: vec![],
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["type"], "search");
        assert_eq!(value["data"]["query"], "rust");
        assert!(value["data"]["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_step_flattens_data_tag() {
        let step = Step {
            id: "s1".into(),
            status: RunStatus::Completed,
            data: StepData::Date {
                date: "August 7, 2026".into(),
            },
            start_datetime: None,
            end_datetime: None,
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["type"], "date");
        assert_eq!(value["data"]["date"], "August 7, 2026");
        assert_eq!(value["status"], "completed");
    }

    #[test]
    fn test_step_data_kind_matches_wire_tag() {
        let cases = [
            (
                StepData::Code {
                    task: "t".into(),
                    code: "c".into(),
                    output: None,
                },
                "code",
            ),
            (
                StepData::Component {
                    component: ComponentKind::FlashCard,
                },
                "component",
            ),
            (StepData::DataAnalysis { text: "x".into() }, "data-analysis"),
        ];
        for (data, kind) in cases {
            assert_eq!(data.kind(), kind);
            assert_eq!(serde_json::to_value(&data).unwrap()["type"], kind);
        }
    }

    #[test]
    fn test_code_step_omits_absent_output() {
        let data = StepData::Code {
            task: "read".into(),
            code: "print(1)".into(),
            output: None,
        };
        let value = serde_json::to_value(&data).unwrap();
        assert!(value["data"].get("output").is_none());
    }

    #[test]
    fn test_started_run_shape() {
        let run = Run::started("call_1", RunKind::AgenticArtifact);
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.start_datetime.is_some());
        assert!(run.end_datetime.is_none());
        assert!(run.steps.is_empty());
    }
}
