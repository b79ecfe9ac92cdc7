//! Configuration for the download orchestrator

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::progress::RelayConfig;
use crate::app::transfer::TransferConfig;
use crate::constants::{policy, storage};

/// What to do when an artifact is over the size ceiling and smaller qualities exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Stop and report the candidates to the caller
    #[default]
    Prompt,
    /// Retry with the closest smaller quality
    Auto,
}

/// Configuration for the download orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Largest deliverable artifact in bytes
    pub size_ceiling_bytes: u64,
    /// Behaviour on oversize artifacts
    pub fallback_mode: FallbackMode,
    /// Upper bound on attempts in auto mode, first attempt included
    pub max_fallback_attempts: u32,
    /// Deadline for a whole request, all attempts included
    pub request_timeout: Option<Duration>,
    /// Directory holding in-flight artifacts
    pub downloads_dir: PathBuf,
    /// Extension given to planned artifact paths
    pub extension: String,
    /// Transfer worker settings
    pub transfer: TransferConfig,
    /// Progress relay settings
    pub relay: RelayConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: policy::DEFAULT_SIZE_CEILING_BYTES,
            fallback_mode: FallbackMode::default(),
            max_fallback_attempts: policy::MAX_FALLBACK_ATTEMPTS,
            request_timeout: None,
            downloads_dir: PathBuf::from(storage::DEFAULT_DOWNLOADS_DIR),
            extension: storage::DEFAULT_EXTENSION.to_string(),
            transfer: TransferConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Set the size ceiling
    pub fn with_size_ceiling(mut self, bytes: u64) -> Self {
        self.size_ceiling_bytes = bytes;
        self
    }

    /// Set the fallback mode
    pub fn with_fallback_mode(mut self, mode: FallbackMode) -> Self {
        self.fallback_mode = mode;
        self
    }

    /// Set the attempt bound for auto fallback
    pub fn with_max_fallback_attempts(mut self, attempts: u32) -> Self {
        self.max_fallback_attempts = attempts;
        self
    }

    /// Set or clear the request deadline
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the directory for in-flight artifacts
    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = dir.into();
        self
    }

    /// Set the transfer worker configuration
    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// Set the progress relay configuration
    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.size_ceiling_bytes == 0 {
            return Err("Size ceiling cannot be zero".to_string());
        }

        if self.max_fallback_attempts == 0 {
            return Err("Max fallback attempts must be at least 1".to_string());
        }

        if matches!(self.request_timeout, Some(timeout) if timeout.is_zero()) {
            return Err("Request timeout cannot be zero".to_string());
        }

        if self.extension.is_empty() || self.extension.contains(|c: char| matches!(c, '/' | '\\' | '.')) {
            return Err(format!("Invalid artifact extension '{}'", self.extension));
        }

        self.transfer.validate()
    }
}
