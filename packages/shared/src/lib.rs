//! Shared utilities for the estate realtime workspace.
//!
//! - `logger`: tracing subscriber setup for binaries
//! - `time`: clock abstraction and timestamp helpers

pub mod logger;
pub mod time;
