//! Pure state folding over the outbound event stream.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use weft_core::protocol::{StepUpdate, WireEvent};
use weft_core::types::{ArtifactBody, Run, RunStatus, Step};

/// A protocol violation observed while reducing. The anomalous event is
/// rejected and reported; unrelated state is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("step update for unknown run {run_id}")]
    UnknownRun { run_id: String },

    #[error("run-end for unknown run {run_id}")]
    RunEndUnknownRun { run_id: String },

    #[error("run-end for run {run_id} carries pending status")]
    RunEndPending { run_id: String },

    #[error("run {run_id} already reached a terminal status")]
    RunAlreadyEnded { run_id: String },

    #[error("step {step_id} in run {run_id} changed kind from {existing} to {incoming}")]
    StepKindChanged {
        run_id: String,
        step_id: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("artifact delta for unknown artifact {artifact_id}")]
    UnknownArtifact { artifact_id: String },
}

/// A relevant source reported by the search delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub source_id: String,
    pub url: String,
}

/// Reduced view of one conversational session.
#[derive(Debug, Default)]
pub struct ClientState {
    runs: HashMap<String, Run>,
    artifacts: HashMap<String, ArtifactBody>,
    current_artifact: Option<String>,
    sources: Vec<SourceRef>,
    reply: String,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state. Upserts are idempotent: applying the
    /// same step-update twice leaves the same state as applying it once.
    pub fn apply(&mut self, event: &WireEvent) -> Result<(), ReduceError> {
        match event {
            WireEvent::RunStart { data } => {
                // First writer wins; a duplicate run-start never clobbers
                // accumulated steps.
                self.runs
                    .entry(data.id.clone())
                    .or_insert_with(|| data.clone());
                Ok(())
            }
            WireEvent::StepUpdate { data } => self.upsert_step(data),
            WireEvent::RunEnd { data } => {
                let run = self.runs.get_mut(&data.id).ok_or_else(|| {
                    ReduceError::RunEndUnknownRun {
                        run_id: data.id.clone(),
                    }
                })?;
                if data.status == RunStatus::Pending {
                    return Err(ReduceError::RunEndPending {
                        run_id: data.id.clone(),
                    });
                }
                if run.status != RunStatus::Pending || run.end_datetime.is_some() {
                    return Err(ReduceError::RunAlreadyEnded {
                        run_id: data.id.clone(),
                    });
                }
                run.status = data.status;
                run.end_datetime = Some(data.end_datetime);
                Ok(())
            }
            WireEvent::ArtifactStart { id, data } => {
                self.artifacts.insert(
                    id.clone(),
                    ArtifactBody {
                        title: data.title.clone(),
                        description: data.description.clone(),
                        plan: data.plan.clone(),
                        content: String::new(),
                    },
                );
                self.current_artifact = Some(id.clone());
                Ok(())
            }
            WireEvent::ArtifactDelta { id, data } => {
                let artifact =
                    self.artifacts
                        .get_mut(id)
                        .ok_or_else(|| ReduceError::UnknownArtifact {
                            artifact_id: id.clone(),
                        })?;
                artifact.content.push_str(&data.delta);
                Ok(())
            }
            WireEvent::SourceUrl { source_id, url } => {
                self.sources.push(SourceRef {
                    source_id: source_id.clone(),
                    url: url.clone(),
                });
                Ok(())
            }
            WireEvent::TextDelta { delta } => {
                self.reply.push_str(delta);
                Ok(())
            }
        }
    }

    /// Apply a stream of events, reporting violations without stopping —
    /// a bad event must not corrupt or block unrelated runs.
    pub fn apply_all<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a WireEvent>,
    ) -> Vec<ReduceError> {
        let mut violations = Vec::new();
        for event in events {
            if let Err(e) = self.apply(event) {
                warn!(%e, "rejected protocol-violating event");
                violations.push(e);
            }
        }
        violations
    }

    fn upsert_step(&mut self, update: &StepUpdate) -> Result<(), ReduceError> {
        let run = self
            .runs
            .get_mut(&update.run_id)
            .ok_or_else(|| ReduceError::UnknownRun {
                run_id: update.run_id.clone(),
            })?;

        match run.steps.get_mut(&update.step_id) {
            Some(step) => {
                // The first event for a step id establishes its kind for good.
                if step.data.kind() != update.data.kind() {
                    return Err(ReduceError::StepKindChanged {
                        run_id: update.run_id.clone(),
                        step_id: update.step_id.clone(),
                        existing: step.data.kind(),
                        incoming: update.data.kind(),
                    });
                }
                step.status = update.status;
                step.data = update.data.clone();
                step.start_datetime = update.start_datetime;
                step.end_datetime = update.end_datetime;
            }
            None => {
                run.steps.insert(
                    update.step_id.clone(),
                    Step {
                        id: update.step_id.clone(),
                        status: update.status,
                        data: update.data.clone(),
                        start_datetime: update.start_datetime,
                        end_datetime: update.end_datetime,
                    },
                );
            }
        }
        Ok(())
    }

    // --- read access ---

    pub fn runs(&self) -> &HashMap<String, Run> {
        &self.runs
    }

    pub fn run(&self, id: &str) -> Option<&Run> {
        self.runs.get(id)
    }

    pub fn artifacts(&self) -> &HashMap<String, ArtifactBody> {
        &self.artifacts
    }

    pub fn current_artifact(&self) -> Option<&ArtifactBody> {
        self.current_artifact
            .as_deref()
            .and_then(|id| self.artifacts.get(id))
    }

    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Session teardown. Nothing survives past this call.
    pub fn clear(&mut self) {
        self.runs.clear();
        self.artifacts.clear();
        self.current_artifact = None;
        self.sources.clear();
        self.reply.clear();
    }
}
