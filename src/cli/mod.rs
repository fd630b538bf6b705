//! CLI module for rango
//!
//! Command handlers behind the `rango` binary.

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::LogLevel;

pub use crate::config::Cli;
