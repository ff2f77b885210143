//! Client-side state for one conversational session.
//!
//! [`ClientState`] folds the ordered event stream into a queryable
//! `Run -> Step` model plus artifact bodies. It is an explicitly constructed
//! object owned by the consuming session — `new` on session start, `clear`
//! on teardown — never ambient global state.

pub mod reducer;

pub use reducer::{ClientState, ReduceError, SourceRef};
