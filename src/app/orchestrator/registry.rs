//! At most one active request per requester
//!
//! Submitting a new request for a requester cancels the one already running
//! and waits for it to finish, including artifact disposal, before the new
//! one is spawned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DownloadOrchestrator, DownloadOutcome};
use crate::app::models::{QualityDescriptor, RequesterId, SourceHandle};
use crate::constants::orchestrator::SHUTDOWN_TIMEOUT;
use crate::errors::RequestError;

struct ActiveRequest {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

type ActiveMap = Arc<Mutex<HashMap<RequesterId, ActiveRequest>>>;

/// Caller's side of a submitted request
#[derive(Debug)]
pub struct RequestHandle {
    requester: RequesterId,
    generation: u64,
    cancel: CancellationToken,
    outcome: oneshot::Receiver<DownloadOutcome>,
}

impl RequestHandle {
    pub fn requester(&self) -> RequesterId {
        self.requester
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the request to stop; the outcome will be `Cancelled`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the request to finish
    pub async fn outcome(self) -> DownloadOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => DownloadOutcome::failed(RequestError::Aborted {
                reason: "request task ended without an outcome".to_string(),
            }),
        }
    }
}

/// Tracks in-flight requests by requester
pub struct RequestRegistry {
    orchestrator: Arc<DownloadOrchestrator>,
    active: ActiveMap,
    submit_locks: Mutex<HashMap<RequesterId, Arc<Mutex<()>>>>,
    shutdown: CancellationToken,
    next_generation: AtomicU64,
}

impl RequestRegistry {
    pub fn new(orchestrator: Arc<DownloadOrchestrator>) -> Self {
        Self {
            orchestrator,
            active: Arc::new(Mutex::new(HashMap::new())),
            submit_locks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn orchestrator(&self) -> &Arc<DownloadOrchestrator> {
        &self.orchestrator
    }

    /// Start a request, superseding any request the requester already has
    ///
    /// Returns once the previous request has fully wound down and the new one
    /// has been spawned.
    pub async fn submit(
        &self,
        requester: RequesterId,
        source: SourceHandle,
        quality: QualityDescriptor,
    ) -> RequestHandle {
        let submit_lock = {
            let mut locks = self.submit_locks.lock().await;
            locks.entry(requester).or_default().clone()
        };
        let serialized = submit_lock.lock().await;

        let previous = self.active.lock().await.remove(&requester);
        if let Some(previous) = previous {
            info!(
                "{}: superseding request generation {}",
                requester, previous.generation
            );
            Self::wind_down(previous).await;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let orchestrator = self.orchestrator.clone();
        let active = self.active.clone();
        let task_cancel = cancel.clone();

        // Held until the entry is inserted so the task cannot finish unseen
        let mut registered = self.active.lock().await;
        let task = tokio::spawn(async move {
            let outcome = orchestrator
                .fetch(requester, source, quality, task_cancel)
                .await;

            // A superseding submit has already removed this entry
            {
                let mut active = active.lock().await;
                if active
                    .get(&requester)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    active.remove(&requester);
                }
            }

            if outcome_tx.send(outcome).is_err() {
                debug!("{}: outcome of generation {} dropped", requester, generation);
            }
        });

        registered.insert(
            requester,
            ActiveRequest {
                generation,
                cancel: cancel.clone(),
                task,
            },
        );
        drop(registered);
        debug!("{}: started request generation {}", requester, generation);

        drop(serialized);
        self.release_submit_lock(requester, submit_lock).await;

        RequestHandle {
            requester,
            generation,
            cancel,
            outcome: outcome_rx,
        }
    }

    /// Forget the requester's submit lock unless another submit holds a clone
    ///
    /// Clones are only taken under the map lock, so a count of one means no
    /// submit is waiting on it.
    async fn release_submit_lock(&self, requester: RequesterId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.submit_locks.lock().await;
        if locks
            .get(&requester)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&requester);
        }
    }

    /// Cancel the requester's active request and wait for it to finish
    ///
    /// Returns `false` if nothing was running.
    pub async fn cancel(&self, requester: RequesterId) -> bool {
        let previous = self.active.lock().await.remove(&requester);
        match previous {
            Some(previous) => {
                info!(
                    "{}: cancelling request generation {}",
                    requester, previous.generation
                );
                Self::wind_down(previous).await;
                true
            }
            None => false,
        }
    }

    /// Number of requests still running
    pub async fn active_count(&self) -> usize {
        self.active
            .lock()
            .await
            .values()
            .filter(|entry| !entry.task.is_finished())
            .count()
    }

    /// Cancel everything and wait up to the shutdown timeout
    pub async fn shutdown(&self) {
        self.shutdown_with_timeout(SHUTDOWN_TIMEOUT).await;
    }

    pub async fn shutdown_with_timeout(&self, timeout: Duration) {
        self.shutdown.cancel();
        let drained: Vec<(RequesterId, ActiveRequest)> =
            self.active.lock().await.drain().collect();
        info!("Shutting down {} active requests", drained.len());

        let wait_all = async {
            for (_, request) in drained {
                Self::wind_down(request).await;
            }
        };
        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            warn!("Shutdown timed out after {:?}", timeout);
        }

        self.submit_locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    async fn wind_down(request: ActiveRequest) {
        request.cancel.cancel();
        if let Err(e) = request.task.await {
            warn!(
                "Request generation {} ended abnormally: {}",
                request.generation, e
            );
        }
    }
}
