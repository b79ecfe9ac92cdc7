//! Error types for Media Relay
//!
//! This module defines the error types for every component of the download
//! pipeline. Errors are grouped by the boundary that produces them so that each
//! component can decide whether to absorb a failure (observer, disposal) or
//! surface it to the caller as a terminal outcome (transfer, delivery).

use std::path::PathBuf;
use thiserror::Error;

/// Quality label and request model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Quality label could not be turned into a numeric rank
    #[error("Invalid quality label: '{label}'. Expected a number like 720 or WIDTHxHEIGHT")]
    InvalidQuality { label: String },

    /// Requested quality is not offered by the source
    #[error("Quality {label} is not available for this source")]
    UnknownQuality { label: String },
}

/// Source resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Source handle does not point at anything usable
    #[error("Source not found: {source_handle}")]
    NotFound { source_handle: String },

    /// Source exists but offers no downloadable qualities
    #[error("Source {source_handle} offers no downloadable qualities")]
    NoQualities { source_handle: String },

    /// I/O error while inspecting the source
    #[error("I/O error while resolving source")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the blocking transfer primitive or the worker around it
#[derive(Error, Debug)]
pub enum TransferError {
    /// I/O error during the transfer
    #[error("Transfer I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure reported by the primitive
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Transfer was stopped through its cancellation token
    #[error("Transfer cancelled")]
    Cancelled,

    /// Primitive reported success but the file is not on disk
    #[error("Transfer finished but artifact is missing: {path}")]
    MissingArtifact { path: PathBuf },

    /// The blocking task panicked or was aborted
    #[error("Transfer worker terminated unexpectedly: {reason}")]
    Panicked { reason: String },
}

/// Errors raised while handing a finished artifact to the delivery sink
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// I/O error reading or writing the artifact
    #[error("Delivery I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sink rejected the artifact
    #[error("Delivery rejected: {reason}")]
    Rejected { reason: String },
}

/// Errors raised by status observers. Never fatal for a request.
#[derive(Error, Debug)]
pub enum ObserverError {
    /// Observer could not deliver the update
    #[error("Observer notification failed: {reason}")]
    Failed { reason: String },

    /// Terminal output error
    #[error("Terminal output error")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Terminal failure of a download request, reported inside its outcome
#[derive(Error, Debug)]
pub enum RequestError {
    /// Source could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Requested quality is unusable
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Transfer failed
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Delivery failed
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Orchestrator configuration is invalid
    #[error("Invalid orchestrator configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Request task ended without reporting an outcome
    #[error("Request aborted: {reason}")]
    Aborted { reason: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Model error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Source resolution error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Delivery error
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Request error
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Observer error
    #[error(transparent)]
    Observer(#[from] ObserverError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Transfer(TransferError::Transport { .. })
            | AppError::Transfer(TransferError::Io(_))
            | AppError::Observer(_) => true,

            AppError::Transfer(TransferError::Cancelled)
            | AppError::Model(_)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Model(_) => "model",
            AppError::Resolve(_) => "resolve",
            AppError::Transfer(_) => "transfer",
            AppError::Delivery(_) => "delivery",
            AppError::Request(_) => "request",
            AppError::Observer(_) => "observer",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Delivery result type alias
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

/// Observer result type alias
pub type ObserverResult<T> = std::result::Result<T, ObserverError>;

/// Resolve result type alias
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
