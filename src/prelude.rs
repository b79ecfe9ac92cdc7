//! Prelude module for Media Relay Library
//!
//! Re-exports the items most integrations need, so a single
//! `use media_relay::prelude::*;` is enough to wire up an orchestrator.

// Core result types
pub use crate::errors::{AppError, RequestError, Result};

// Pipeline entry points
pub use crate::app::{
    DownloadOrchestrator, DownloadOutcome, FallbackMode, OrchestratorConfig, RequestHandle,
    RequestRegistry,
};

// Data types
pub use crate::app::{ArtifactResult, QualityDescriptor, RequesterId, ResolvedSource, SourceHandle};

// Collaborator contracts
pub use crate::app::{DeliverySink, Notice, SourceResolver, StatusObserver, TransferPrimitive};

// Configuration
pub use crate::config::AppConfig;

pub use tokio_util::sync::CancellationToken;
