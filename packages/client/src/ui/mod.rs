//! Interactive console client driving the realtime core.

pub mod command;
pub mod formatter;
mod prompt;
mod runner;
mod session;

pub use runner::{ClientOptions, run_client};
