//! Boundary contracts for external collaborators
//!
//! The orchestrator only talks to the outside world through these traits:
//! a resolver that lists qualities, a blocking transfer primitive, a status
//! observer and a delivery sink. Reference implementations live in
//! [`crate::app::local`] and [`crate::cli::progress`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::app::models::{ArtifactResult, QualityDescriptor, ResolvedSource, SourceHandle};
use crate::errors::{DeliveryResult, ObserverResult, ResolveResult, TransferResult};

/// Progress callback handed to the transfer primitive
///
/// Called with `(bytes_transferred, bytes_total)`; `bytes_total == 0` means the
/// total is not known yet. May be invoked from any thread.
pub type ProgressCallback<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Lists the qualities a source offers
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, source: &SourceHandle) -> ResolveResult<ResolvedSource>;
}

/// Everything the blocking primitive needs for one transfer
#[derive(Debug, Clone)]
pub struct TransferSpec<'a> {
    pub source: &'a SourceHandle,
    pub quality: &'a QualityDescriptor,
    /// Directory the file must be written into
    pub destination_dir: &'a Path,
    /// Preferred final path inside `destination_dir`
    pub destination: &'a Path,
    /// Degree of internal chunk parallelism
    pub worker_count: usize,
}

/// Synchronous, progress-reporting download operation
///
/// Implementations block the calling thread until the file is complete and
/// return its final path. Cancellation support is best-effort: an
/// implementation that cannot abort mid-transfer may ignore `cancel`.
pub trait TransferPrimitive: Send + Sync {
    fn download(
        &self,
        spec: &TransferSpec<'_>,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> TransferResult<PathBuf>;
}

/// Lifecycle notices sent to the observer alongside progress milestones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A transfer attempt is starting
    Started { quality: QualityDescriptor },
    /// The artifact is being handed to the delivery sink
    Delivering { size_bytes: u64 },
    /// Delivery completed
    Delivered { quality: QualityDescriptor },
    /// Artifact exceeded the ceiling; smaller candidates exist
    Oversize {
        size_bytes: u64,
        ceiling: u64,
        candidates: Vec<QualityDescriptor>,
    },
    /// Artifact exceeded the ceiling and nothing smaller exists
    Rejected { size_bytes: u64, ceiling: u64 },
    /// Request ended with an error
    Failed { reason: String },
}

/// Receives user-facing status updates
///
/// Observers may be rate limited or fail transiently; their errors are logged
/// and never abort a transfer.
#[async_trait]
pub trait StatusObserver: Send + Sync {
    async fn update_status(&self, phase: &str, percent: u8) -> ObserverResult<()>;

    async fn notify(&self, _notice: Notice) -> ObserverResult<()> {
        Ok(())
    }
}

/// Final hand-off of a finished artifact
///
/// The artifact is disposed as soon as `deliver` returns, whatever the result.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, artifact: &ArtifactResult, title: &str) -> DeliveryResult<()>;
}

/// Observer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

#[async_trait]
impl StatusObserver for NullObserver {
    async fn update_status(&self, _phase: &str, _percent: u8) -> ObserverResult<()> {
        Ok(())
    }
}
