//! Transfer worker: runs the blocking primitive off the async runtime
//!
//! The worker dispatches [`TransferPrimitive::download`] onto tokio's blocking
//! pool, wires the primitive's synchronous progress callback into the progress
//! channel, and guarantees the channel's terminal marker is sent whether the
//! primitive succeeds, fails or panics. It never deletes or renames files; the
//! [`ArtifactGuard`] passed in is only told about the final path.

pub mod config;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::artifact::{ArtifactGuard, ArtifactManager};
use crate::app::models::{ArtifactResult, DownloadRequest};
use crate::app::ports::{TransferPrimitive, TransferSpec};
use crate::app::progress::ProgressSender;
use crate::errors::{TransferError, TransferResult};

pub use config::TransferConfig;

/// Runs one blocking transfer per call
#[derive(Clone)]
pub struct TransferWorker {
    primitive: Arc<dyn TransferPrimitive>,
    config: TransferConfig,
}

impl TransferWorker {
    pub fn new(primitive: Arc<dyn TransferPrimitive>, config: TransferConfig) -> Self {
        Self { primitive, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Download `request` and verify the resulting file
    ///
    /// Always waits for the blocking thread to exit, even after `cancel`
    /// fires, so the caller can dispose safely once this returns.
    ///
    /// # Errors
    ///
    /// Returns the primitive's `TransferError`, `MissingArtifact` if the
    /// reported file is absent, or `Panicked` if the blocking task died.
    pub async fn run(
        &self,
        request: Arc<DownloadRequest>,
        artifacts: &ArtifactManager,
        guard: &mut ArtifactGuard,
        progress: ProgressSender,
        cancel: CancellationToken,
    ) -> TransferResult<ArtifactResult> {
        let primitive = self.primitive.clone();
        let worker_count = self.config.worker_count;
        let job = request.clone();

        info!(
            "Starting transfer of {} at {} with {} workers",
            request.source, request.quality, worker_count
        );

        let handle = tokio::task::spawn_blocking(move || {
            let spec = TransferSpec {
                source: &job.source,
                quality: &job.quality,
                destination_dir: job.destination_dir(),
                destination: &job.destination,
                worker_count,
            };
            let on_progress = |transferred: u64, total: u64| {
                progress.send_blocking(transferred, total);
            };

            let result = primitive.download(&spec, &cancel, &on_progress);
            progress.finish_blocking();
            result
        });

        let final_path = match handle.await {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                debug!("Transfer of {} failed: {}", request.source, e);
                return Err(e);
            }
            Err(join_error) => {
                warn!("Transfer task for {} died: {}", request.source, join_error);
                return Err(TransferError::Panicked {
                    reason: join_error.to_string(),
                });
            }
        };

        guard.track(&final_path);
        let artifact = artifacts.verify(&final_path, &request.quality).await?;
        info!(
            "Transfer complete: {} ({} bytes)",
            artifact.path.display(),
            artifact.size_bytes
        );
        Ok(artifact)
    }
}
