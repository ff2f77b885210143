//! Core types, wire protocol, event writer, and config for Weft.

pub mod config;
pub mod error;
pub mod markup;
pub mod protocol;
pub mod transcript;
pub mod types;
pub mod writer;
