//! Command-line argument parsing for Media Relay
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! one asset at one quality, listing the qualities a source offers, and
//! writing the default configuration file.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Media Relay - download media with progress relay and size-aware fallback
#[derive(Parser, Debug)]
#[command(
    name = "media_relay",
    version,
    about = "Download a media asset at a chosen quality and relay it to an output directory",
    long_about = "Downloads one media asset at a requested quality while reporting progress milestones.
Files over the size ceiling are rejected with a list of smaller qualities, or retried
automatically at the next smaller quality. Temporary files are always cleaned up."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a source at one quality and deliver it
    Fetch(FetchArgs),

    /// List the qualities a source offers
    Qualities(QualitiesArgs),

    /// Write the default configuration file if none exists
    Init,
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Source to download (a directory of quality variants for local sources)
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Requested quality, e.g. 720 or 1920x1080
    #[arg(long, value_name = "QUALITY")]
    pub quality: String,

    /// Directory delivered files are copied into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Retry at the next smaller quality instead of listing alternatives
    #[arg(long)]
    pub auto_fallback: bool,

    /// Chunk workers per transfer
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Give up after this long, e.g. 30s or 5m
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub timeout: Option<Duration>,

    /// Size ceiling in MiB
    #[arg(long, value_name = "MIB")]
    pub max_size_mib: Option<u64>,
}

/// Arguments for the qualities command
#[derive(Args, Debug, Clone)]
pub struct QualitiesArgs {
    /// Source to inspect
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl FetchArgs {
    /// Check argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.quality.trim().is_empty() {
            return Err("Quality cannot be empty".to_string());
        }

        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }

        if self.max_size_mib == Some(0) {
            return Err("Size ceiling must be greater than 0 MiB".to_string());
        }

        if matches!(self.timeout, Some(timeout) if timeout.is_zero()) {
            return Err("Timeout must be greater than zero".to_string());
        }

        Ok(())
    }
}
