//! Agent loops — the orchestrator and the three delegate agents.
//!
//! Every loop here is the same machine: a step-counted iteration over an
//! injected capability table, streaming one completion per step and
//! executing tool calls serially. Delegates additionally report progress
//! onto the shared event writer as they go.

pub mod artifact;
pub mod data_analysis;
pub mod orchestrator;
pub mod prompt;
pub mod runtime;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::Orchestrator;
pub use runtime::{LoopConfig, LoopObserver, LoopOutcome, run_loop};
