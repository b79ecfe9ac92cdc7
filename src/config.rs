//! Configuration management for Media Relay
//!
//! Settings live in a single TOML file with one section per component. Missing
//! sections and keys fall back to defaults, so an empty file is a valid
//! configuration. A commented default file is written on first run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::orchestrator::{FallbackMode, OrchestratorConfig};
use crate::app::progress::{PhaseEntry, PhaseTable, RelayConfig};
use crate::app::transfer::TransferConfig;
use crate::constants::{logging, policy, progress, storage, transfer};
use crate::errors::{AppError, ConfigError, Result};

/// File name searched for in the working directory
pub const LOCAL_CONFIG_FILE: &str = "media-relay.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Size policy, fallback and deadline settings
    pub orchestrator: OrchestratorConfigToml,
    /// Transfer worker settings
    pub transfer: TransferConfigToml,
    /// Progress relay settings
    pub relay: RelayConfigToml,
    /// Artifact and delivery directories
    pub storage: StorageConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfigToml {
    /// Largest deliverable artifact in bytes
    pub size_ceiling_bytes: u64,
    /// "prompt" or "auto"
    pub fallback_mode: FallbackMode,
    /// Attempt bound for automatic fallback
    pub max_fallback_attempts: u32,
    /// Deadline for a whole request, e.g. "10m"
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

impl Default for OrchestratorConfigToml {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: policy::DEFAULT_SIZE_CEILING_BYTES,
            fallback_mode: FallbackMode::Prompt,
            max_fallback_attempts: policy::MAX_FALLBACK_ATTEMPTS,
            request_timeout: None,
        }
    }
}

/// TOML-friendly transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfigToml {
    /// Chunk parallelism inside one transfer
    pub worker_count: usize,
    /// Progress channel capacity
    pub channel_capacity: usize,
}

impl Default for TransferConfigToml {
    fn default() -> Self {
        Self {
            worker_count: transfer::DEFAULT_WORKER_COUNT,
            channel_capacity: progress::CHANNEL_CAPACITY,
        }
    }
}

/// TOML-friendly relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfigToml {
    /// Minimum time between observer updates, "0s" disables throttling
    #[serde(with = "humantime_serde")]
    pub min_update_interval: Duration,
    /// Phase labels by minimum percentage
    pub phases: Vec<PhaseEntry>,
}

impl Default for RelayConfigToml {
    fn default() -> Self {
        Self {
            min_update_interval: Duration::ZERO,
            phases: PhaseTable::default().entries().iter().rev().cloned().collect(),
        }
    }
}

/// TOML-friendly storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfigToml {
    /// Directory for in-flight artifacts
    pub downloads_dir: PathBuf,
    /// Directory delivered files are copied into
    pub output_dir: PathBuf,
    /// Artifact file extension
    pub extension: String,
}

impl Default for StorageConfigToml {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from(storage::DEFAULT_DOWNLOADS_DIR),
            output_dir: PathBuf::from("."),
            extension: storage::DEFAULT_EXTENSION.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> OrchestratorConfig {
        let mut config = self.orchestrator.to_runtime_config();
        config.transfer = self.transfer.to_runtime_config();
        config.relay = self.relay.to_runtime_config();
        config.downloads_dir = self.storage.downloads_dir.clone();
        config.extension = self.storage.extension.clone();
        config
    }

    /// Check every section, collecting all problems
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.to_runtime_config().validate() {
            errors.push(e);
        }
        for entry in &self.relay.phases {
            if entry.min_percent > 100 {
                errors.push(format!(
                    "Phase '{}' threshold {} is above 100",
                    entry.label, entry.min_percent
                ));
            }
        }
        if !matches!(
            self.logging.level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            errors.push(format!("Unknown log level '{}'", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Load configuration from an explicit file or the standard locations
    ///
    /// An explicit path must exist; otherwise the first file found wins and
    /// defaults apply when there is none.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound { path }.into()),
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Create the user config file with defaults if none exists yet
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(LOCAL_CONFIG_FILE)];
        if let Ok(user_path) = Self::get_default_config_path() {
            search_paths.push(user_path);
        }
        #[cfg(unix)]
        search_paths.push(PathBuf::from("/etc/media-relay/config.toml"));

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir.join("media-relay").join("config.toml"))
    }

    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration file with comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Media Relay Configuration
# This file was automatically generated on first run.
# Every key is optional; removed keys fall back to these defaults.

[orchestrator]
# Largest file that will be delivered ({} MiB)
size_ceiling_bytes = {}

# What to do when a file is too large: "prompt" lists smaller qualities,
# "auto" retries with the next smaller one
fallback_mode = "prompt"
max_fallback_attempts = {}

# Give up on a request after this long, e.g. "10m"
# request_timeout = "10m"

[transfer]
# Parallel chunk workers per transfer
worker_count = {}
channel_capacity = {}

[relay]
# Minimum time between progress updates ("0s" = every milestone)
min_update_interval = "0s"

[[relay.phases]]
min_percent = 0
label = "{}"

[[relay.phases]]
min_percent = 30
label = "{}"

[[relay.phases]]
min_percent = 70
label = "{}"

[[relay.phases]]
min_percent = 100
label = "{}"

[storage]
# In-flight artifacts; cleaned up after every request
downloads_dir = "{}"
# Where delivered files are copied
output_dir = "."
extension = "{}"

[logging]
level = "{}"  # error, warn, info, debug, trace
"#,
            policy::DEFAULT_SIZE_CEILING_BYTES / (1024 * 1024),
            policy::DEFAULT_SIZE_CEILING_BYTES,
            policy::MAX_FALLBACK_ATTEMPTS,
            transfer::DEFAULT_WORKER_COUNT,
            progress::CHANNEL_CAPACITY,
            progress::PHASE_TRANSFERRING,
            progress::PHASE_PROCESSING,
            progress::PHASE_FINALIZING,
            progress::PHASE_READY,
            storage::DEFAULT_DOWNLOADS_DIR,
            storage::DEFAULT_EXTENSION,
            logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl OrchestratorConfigToml {
    /// Convert to a runtime config with default transfer and relay settings
    pub fn to_runtime_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_size_ceiling(self.size_ceiling_bytes)
            .with_fallback_mode(self.fallback_mode)
            .with_max_fallback_attempts(self.max_fallback_attempts)
            .with_request_timeout(self.request_timeout)
    }
}

impl TransferConfigToml {
    pub fn to_runtime_config(&self) -> TransferConfig {
        TransferConfig::default()
            .with_worker_count(self.worker_count)
            .with_channel_capacity(self.channel_capacity)
    }
}

impl RelayConfigToml {
    pub fn to_runtime_config(&self) -> RelayConfig {
        let phases = if self.phases.is_empty() {
            PhaseTable::default()
        } else {
            PhaseTable::new(self.phases.iter().cloned())
        };

        RelayConfig {
            phases,
            min_update_interval: self.min_update_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();

        assert_eq!(config.transfer.worker_count, transfer::DEFAULT_WORKER_COUNT);
        assert_eq!(config.orchestrator.fallback_mode, FallbackMode::Prompt);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.relay.phases.len(), 4);
        assert_eq!(config.relay.phases[0].min_percent, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content();

        let parsed: AppConfig = toml::from_str(&content).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(
            parsed.orchestrator.size_ceiling_bytes,
            defaults.orchestrator.size_ceiling_bytes
        );
        assert_eq!(parsed.relay.phases, defaults.relay.phases);
        assert_eq!(parsed.storage.extension, "mp4");
        assert!(content.contains("# Media Relay Configuration"));
        assert!(content.contains("[orchestrator]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("media-relay.toml");

        let test_config = r#"
[orchestrator]
fallback_mode = "auto"
request_timeout = "90s"

[relay]
min_update_interval = "250ms"

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load(Some(config_path)).await.unwrap();
        assert_eq!(config.logging.level, "debug");

        let runtime = config.to_runtime_config();
        assert_eq!(runtime.fallback_mode, FallbackMode::Auto);
        assert_eq!(runtime.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(runtime.relay.min_update_interval, Duration::from_millis(250));
        assert_eq!(runtime.transfer.worker_count, transfer::DEFAULT_WORKER_COUNT);
        assert_eq!(runtime.size_ceiling_bytes, policy::DEFAULT_SIZE_CEILING_BYTES);
        assert_eq!(runtime.relay.phases.label_for(75), progress::PHASE_FINALIZING);
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");

        let test_config = r#"
[transfer]
worker_count = 0

[[relay.phases]]
min_percent = 150
label = "beyond"

[logging]
level = "loud"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        match AppConfig::load(Some(config_path)).await {
            Err(AppError::Config(ConfigError::ValidationFailed { errors })) => {
                assert_eq!(errors.len(), 3);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[orchestrator\nsize = ")
            .await
            .unwrap();

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::InvalidFormat(_)))
        ));
    }
}
