//! Download orchestration
//!
//! The orchestrator drives one top-level request from source resolution to a
//! [`DownloadOutcome`]. Each attempt runs the transfer worker and the progress
//! relay side by side, evaluates the artifact against the size policy, and
//! either delivers it, falls back to a smaller quality or gives up. Every
//! attempt owns an [`ArtifactGuard`], so the file is disposed exactly once no
//! matter how the attempt ends.
//!
//! - [`config`] - orchestrator settings and fallback mode
//! - [`state`] - per-attempt state machine and outcomes
//! - [`registry`] - at most one active request per requester

pub mod config;
pub mod registry;
pub mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::artifact::{ArtifactGuard, ArtifactManager};
use crate::app::models::{
    ArtifactResult, DownloadRequest, QualityDescriptor, RequesterId, ResolvedSource,
    SourceHandle,
};
use crate::app::policy::{SizeDecision, SizePolicy};
use crate::app::ports::{DeliverySink, Notice, SourceResolver, StatusObserver, TransferPrimitive};
use crate::app::progress::{progress_channel, ProgressRelay};
use crate::app::transfer::TransferWorker;
use crate::errors::{ModelError, RequestError, ResolveResult, TransferError};

pub use config::{FallbackMode, OrchestratorConfig};
pub use registry::{RequestHandle, RequestRegistry};
pub use state::{DownloadOutcome, RequestState, StateTracker};

/// How a single attempt ended
#[derive(Debug)]
enum AttemptOutcome {
    Delivered {
        size_bytes: u64,
    },
    Oversize {
        size_bytes: u64,
        candidates: Vec<QualityDescriptor>,
    },
    Exhausted {
        size_bytes: u64,
    },
    Failed(RequestError),
    Cancelled,
}

/// Drives download requests through transfer, size policy and delivery
pub struct DownloadOrchestrator {
    config: OrchestratorConfig,
    resolver: Arc<dyn SourceResolver>,
    worker: TransferWorker,
    observer: Arc<dyn StatusObserver>,
    sink: Arc<dyn DeliverySink>,
    artifacts: ArtifactManager,
    policy: SizePolicy,
}

impl DownloadOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        resolver: Arc<dyn SourceResolver>,
        primitive: Arc<dyn TransferPrimitive>,
        observer: Arc<dyn StatusObserver>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        let artifacts = ArtifactManager::new(&config.downloads_dir, config.extension.clone());
        let worker = TransferWorker::new(primitive, config.transfer.clone());
        let policy = SizePolicy::new(config.size_ceiling_bytes);

        Self {
            config,
            resolver,
            worker,
            observer,
            sink,
            artifacts,
            policy,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    /// List what a source offers without downloading anything
    pub async fn available_qualities(
        &self,
        source: &SourceHandle,
    ) -> ResolveResult<ResolvedSource> {
        self.resolver.resolve(source).await
    }

    /// Run a top-level request to completion
    ///
    /// The source is resolved once; fallback attempts reuse that listing.
    /// Cancelling `cancel` stops the active attempt, waits for the transfer
    /// thread to exit and disposes the artifact before returning.
    pub async fn fetch(
        &self,
        requester: RequesterId,
        source: SourceHandle,
        quality: QualityDescriptor,
        cancel: CancellationToken,
    ) -> DownloadOutcome {
        let token = cancel.child_token();
        let deadline = self.config.request_timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        warn!("Request deadline of {:?} reached", timeout);
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        let outcome = self.run_request(requester, source, quality, &token).await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let outcome = match outcome {
            DownloadOutcome::Cancelled if token.is_cancelled() && !cancel.is_cancelled() => {
                DownloadOutcome::TimedOut
            }
            other => other,
        };
        info!("{}: request finished as {}", requester, outcome.label());
        outcome
    }

    async fn run_request(
        &self,
        requester: RequesterId,
        source: SourceHandle,
        quality: QualityDescriptor,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        if let Err(reason) = self.config.validate() {
            return self
                .fail(RequestError::InvalidConfig { reason }, cancel)
                .await;
        }

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return DownloadOutcome::Cancelled,
            resolved = self.resolver.resolve(&source) => resolved,
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(e, cancel).await,
        };

        let Some(requested) = resolved.find(&quality).cloned() else {
            let error = ModelError::UnknownQuality {
                label: quality.id.clone(),
            };
            return self.fail(error, cancel).await;
        };

        if let Err(e) = self.artifacts.prepare().await {
            return self.fail(TransferError::Io(e), cancel).await;
        }

        let mut tracker = StateTracker::new(requester);
        let mut current = requested;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if attempts > 1 {
                tracker.advance(RequestState::Pending);
            }

            let outcome = self
                .attempt(requester, &source, &resolved, &current, &mut tracker, cancel)
                .await;

            match outcome {
                AttemptOutcome::Delivered { size_bytes } => {
                    return DownloadOutcome::Delivered {
                        quality: current,
                        size_bytes,
                        attempts,
                    };
                }
                AttemptOutcome::Oversize {
                    size_bytes,
                    candidates,
                } => {
                    let retry = self.config.fallback_mode == FallbackMode::Auto
                        && attempts < self.config.max_fallback_attempts;
                    let next = candidates.first().filter(|_| retry).cloned();
                    match next {
                        Some(next) => {
                            info!(
                                "{}: {} is {} bytes, falling back to {}",
                                requester, current, size_bytes, next
                            );
                            current = next;
                        }
                        None => {
                            return DownloadOutcome::FallbackAvailable {
                                attempted: current,
                                size_bytes,
                                candidates,
                            };
                        }
                    }
                }
                AttemptOutcome::Exhausted { size_bytes } => {
                    return DownloadOutcome::Rejected {
                        attempted: current,
                        size_bytes,
                        ceiling: self.policy.ceiling_bytes(),
                    };
                }
                AttemptOutcome::Failed(error) => return DownloadOutcome::Failed { error },
                AttemptOutcome::Cancelled => return DownloadOutcome::Cancelled,
            }
        }
    }

    async fn attempt(
        &self,
        requester: RequesterId,
        source: &SourceHandle,
        resolved: &ResolvedSource,
        quality: &QualityDescriptor,
        tracker: &mut StateTracker,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let destination = self.artifacts.plan_path(requester, &resolved.title, quality);
        let request = Arc::new(DownloadRequest::new(
            source.clone(),
            quality.clone(),
            destination,
        ));
        let mut guard = self.artifacts.guard(&request.destination);

        self.notify(
            Notice::Started {
                quality: quality.clone(),
            },
            cancel,
        )
        .await;

        tracker.advance(RequestState::Transferring);
        let (sender, receiver) = progress_channel(self.config.transfer.channel_capacity);
        let relay = ProgressRelay::new(self.config.relay.clone(), self.observer.clone());

        let (transfer, report) = tokio::join!(
            self.worker.run(
                request.clone(),
                &self.artifacts,
                &mut guard,
                sender,
                cancel.clone()
            ),
            relay.run(receiver, cancel.clone()),
        );
        debug!(
            "{}: relay ended {:?} after {} events",
            requester, report.exit, report.events_seen
        );

        if cancel.is_cancelled() {
            tracker.advance(RequestState::Cancelled);
            guard.dispose().await;
            return AttemptOutcome::Cancelled;
        }

        let artifact = match transfer {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("{}: transfer of {} failed: {}", requester, quality, e);
                tracker.advance(RequestState::Failed);
                guard.dispose().await;
                let error = RequestError::from(e);
                self.notify(
                    Notice::Failed {
                        reason: error.to_string(),
                    },
                    cancel,
                )
                .await;
                return AttemptOutcome::Failed(error);
            }
        };

        tracker.advance(RequestState::Evaluating);
        match self.policy.evaluate(artifact, quality, &resolved.qualities) {
            SizeDecision::Deliverable(artifact) => {
                tracker.advance(RequestState::Delivering);
                self.deliver(&artifact, &resolved.title, guard, tracker, cancel)
                    .await
            }
            SizeDecision::Oversize {
                artifact,
                candidates,
            } => {
                tracker.advance(RequestState::RetryingLowerQuality);
                guard.dispose().await;
                self.notify(
                    Notice::Oversize {
                        size_bytes: artifact.size_bytes,
                        ceiling: self.policy.ceiling_bytes(),
                        candidates: candidates.clone(),
                    },
                    cancel,
                )
                .await;
                AttemptOutcome::Oversize {
                    size_bytes: artifact.size_bytes,
                    candidates,
                }
            }
            SizeDecision::OversizeExhausted { artifact } => {
                tracker.advance(RequestState::Rejected);
                guard.dispose().await;
                self.notify(
                    Notice::Rejected {
                        size_bytes: artifact.size_bytes,
                        ceiling: self.policy.ceiling_bytes(),
                    },
                    cancel,
                )
                .await;
                AttemptOutcome::Exhausted {
                    size_bytes: artifact.size_bytes,
                }
            }
        }
    }

    /// Hand the artifact to the sink, then dispose it whatever the result
    ///
    /// Delivery is not interrupted by cancellation; the sink always finishes
    /// with the file before it is removed.
    async fn deliver(
        &self,
        artifact: &ArtifactResult,
        title: &str,
        mut guard: ArtifactGuard,
        tracker: &mut StateTracker,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        self.notify(
            Notice::Delivering {
                size_bytes: artifact.size_bytes,
            },
            cancel,
        )
        .await;

        let delivered = self.sink.deliver(artifact, title).await;
        guard.dispose().await;

        match delivered {
            Ok(()) => {
                info!(
                    "Delivered {} at {} ({} bytes)",
                    title, artifact.quality, artifact.size_bytes
                );
                self.notify(
                    Notice::Delivered {
                        quality: artifact.quality.clone(),
                    },
                    cancel,
                )
                .await;
                AttemptOutcome::Delivered {
                    size_bytes: artifact.size_bytes,
                }
            }
            Err(e) => {
                warn!("Delivery of {} failed: {}", title, e);
                tracker.advance(RequestState::Failed);
                let error = RequestError::from(e);
                self.notify(
                    Notice::Failed {
                        reason: error.to_string(),
                    },
                    cancel,
                )
                .await;
                AttemptOutcome::Failed(error)
            }
        }
    }

    async fn fail(
        &self,
        error: impl Into<RequestError>,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        let error = error.into();
        warn!("Request failed: {}", error);
        self.notify(
            Notice::Failed {
                reason: error.to_string(),
            },
            cancel,
        )
        .await;
        DownloadOutcome::Failed { error }
    }

    /// Send a lifecycle notice; failures are logged and dropped
    async fn notify(&self, notice: Notice, cancel: &CancellationToken) {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = self.observer.notify(notice) => result,
        };
        if let Err(e) = result {
            warn!("Observer failed to take notice: {}", e);
        }
    }
}
