//! Weft outbound wire protocol.
//!
//! A closed, versionless set of events multiplexed onto the single outbound
//! stream. Every event is self-contained; events for a given run or artifact
//! id are totally ordered by emission, with no global ordering across
//! unrelated ids.

use serde::{Deserialize, Serialize};

use crate::types::{now_millis, Run, RunKind, RunStatus, StepData};

/// An event on the outbound stream, keyed by a `type` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    /// A delegate run has started.
    #[serde(rename = "data-chain-of-thought-run-start")]
    RunStart { data: Run },

    /// A step inside a run was created or replaced in place.
    #[serde(rename = "data-chain-of-thought-step-update")]
    StepUpdate { data: StepUpdate },

    /// A delegate run reached its terminal status.
    #[serde(rename = "data-chain-of-thought-run-end")]
    RunEnd { data: RunEnd },

    /// An authored document came into existence.
    #[serde(rename = "data-artifact-start")]
    ArtifactStart { id: String, data: ArtifactHeader },

    /// An append-only fragment of artifact content.
    #[serde(rename = "data-artifact-delta")]
    ArtifactDelta { id: String, data: ArtifactDelta },

    /// A source the search delegate judged relevant.
    #[serde(rename = "source-url")]
    SourceUrl {
        #[serde(rename = "sourceId")]
        source_id: String,
        url: String,
    },

    /// Orchestrator conversational prose, streamed as it is generated.
    #[serde(rename = "text-delta")]
    TextDelta { delta: String },
}

/// Payload of a step-update event. The step kind rides in `data`'s adjacent
/// `type` tag; the first event for a (runId, stepId) pair establishes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    pub run_id: String,
    pub step_id: String,
    pub status: RunStatus,
    #[serde(flatten)]
    pub data: StepData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<i64>,
}

/// Payload of a run-end event. `status` is never `pending` here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEnd {
    pub id: String,
    pub status: RunStatus,
    pub end_datetime: i64,
}

/// Payload of an artifact-start event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub title: String,
    pub description: String,
    pub plan: String,
}

/// Payload of an artifact-delta event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDelta {
    pub delta: String,
}

impl WireEvent {
    pub fn run_start(id: impl Into<String>, kind: RunKind) -> Self {
        WireEvent::RunStart {
            data: Run::started(id, kind),
        }
    }

    pub fn run_end(id: impl Into<String>, status: RunStatus) -> Self {
        WireEvent::RunEnd {
            data: RunEnd {
                id: id.into(),
                status,
                end_datetime: now_millis(),
            },
        }
    }

    pub fn step_update(
        run_id: impl Into<String>,
        step_id: impl Into<String>,
        status: RunStatus,
        data: StepData,
    ) -> Self {
        WireEvent::StepUpdate {
            data: StepUpdate {
                run_id: run_id.into(),
                step_id: step_id.into(),
                status,
                data,
                start_datetime: None,
                end_datetime: None,
            },
        }
    }

    pub fn artifact_start(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        WireEvent::ArtifactStart {
            id: id.into(),
            data: ArtifactHeader {
                title: title.into(),
                description: description.into(),
                plan: plan.into(),
            },
        }
    }

    pub fn artifact_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        WireEvent::ArtifactDelta {
            id: id.into(),
            data: ArtifactDelta {
                delta: delta.into(),
            },
        }
    }
}
