//! Core download pipeline for Media Relay
//!
//! This module contains the components that take a request for one media
//! asset at one quality and carry it through transfer, progress reporting,
//! size policy and delivery, with guaranteed artifact cleanup.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use media_relay::app::{
//!     DirectorySink, DirectorySource, DownloadOrchestrator, LocalCopyTransfer, NullObserver,
//!     OrchestratorConfig, QualityDescriptor, RequesterId, SourceHandle,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = DownloadOrchestrator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(DirectorySource),
//!     Arc::new(LocalCopyTransfer::new()),
//!     Arc::new(NullObserver),
//!     Arc::new(DirectorySink::new("out")),
//! );
//!
//! let outcome = orchestrator
//!     .fetch(
//!         RequesterId(1),
//!         SourceHandle::new("media/sunset"),
//!         QualityDescriptor::parse("720")?,
//!         CancellationToken::new(),
//!     )
//!     .await;
//! println!("{}", outcome.label());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod local;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod ports;
pub mod progress;
pub mod transfer;

pub use artifact::{sanitize_title, ArtifactGuard, ArtifactManager, ArtifactStatsSnapshot};
pub use local::{DirectorySink, DirectorySource, LocalCopyTransfer};
pub use models::{
    ArtifactResult, DownloadRequest, QualityDescriptor, RequesterId, ResolvedSource,
    SourceHandle,
};
pub use orchestrator::{
    DownloadOrchestrator, DownloadOutcome, FallbackMode, OrchestratorConfig, RequestHandle,
    RequestRegistry, RequestState,
};
pub use policy::{fallback_candidates, SizeDecision, SizePolicy};
pub use ports::{
    DeliverySink, Notice, NullObserver, ProgressCallback, SourceResolver, StatusObserver,
    TransferPrimitive, TransferSpec,
};
pub use progress::{
    progress_channel, PhaseEntry, PhaseTable, ProgressEvent, ProgressMilestone, ProgressReceiver,
    ProgressRelay, ProgressSender, RelayConfig, RelayReport,
};
pub use transfer::{TransferConfig, TransferWorker};
