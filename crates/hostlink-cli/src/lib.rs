//! Hostlink CLI library
//!
//! This library provides the pieces behind the `hostlink` binary: argument
//! parsing, configuration loading and the handlers for each subcommand.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::{CommandDispatcher, ReplayOutcome};
pub use config::{AppConfig, ReplayConfig};
pub use error::{CliError, Result};
