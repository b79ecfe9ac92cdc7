//! Command-line interface components
//!
//! This module contains CLI-specific code for the Media Relay application,
//! including argument parsing, terminal progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, FetchArgs, GlobalArgs, QualitiesArgs};
pub use commands::{build_runtime_config, handle_fetch, handle_init, handle_qualities};
pub use progress::{describe_notice, TerminalObserver};
