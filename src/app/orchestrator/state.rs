//! Per-attempt state machine and request outcomes

use std::fmt;

use tracing::{info, warn};

use crate::app::models::{QualityDescriptor, RequesterId};
use crate::errors::RequestError;

/// Where an attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Pending,
    Transferring,
    Evaluating,
    Delivering,
    RetryingLowerQuality,
    Rejected,
    Failed,
    Cancelled,
}

impl RequestState {
    /// No further transitions are allowed from here
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Rejected | RequestState::Failed | RequestState::Cancelled
        )
    }

    /// Whether `next` is a legal successor
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;

        match (self, next) {
            (Pending, Transferring) => true,
            (Transferring, Evaluating) | (Transferring, Failed) => true,
            (Evaluating, Delivering)
            | (Evaluating, RetryingLowerQuality)
            | (Evaluating, Rejected) => true,
            (Delivering, Failed) => true,
            (RetryingLowerQuality, Pending) => true,
            (Pending | Transferring | Evaluating | Delivering, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Pending => "pending",
            RequestState::Transferring => "transferring",
            RequestState::Evaluating => "evaluating",
            RequestState::Delivering => "delivering",
            RequestState::RetryingLowerQuality => "retrying-lower-quality",
            RequestState::Rejected => "rejected",
            RequestState::Failed => "failed",
            RequestState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Logs every transition of one request
#[derive(Debug)]
pub struct StateTracker {
    requester: RequesterId,
    state: RequestState,
    history: Vec<RequestState>,
}

impl StateTracker {
    pub fn new(requester: RequesterId) -> Self {
        Self {
            requester,
            state: RequestState::Pending,
            history: vec![RequestState::Pending],
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    /// Move to `next`, logging the transition
    ///
    /// Illegal transitions are logged and applied anyway; the state machine is
    /// advisory and never blocks cleanup.
    pub fn advance(&mut self, next: RequestState) {
        if self.state.can_transition_to(next) {
            info!("{}: {} -> {}", self.requester, self.state, next);
        } else {
            warn!(
                "{}: unexpected transition {} -> {}",
                self.requester, self.state, next
            );
        }
        self.state = next;
        self.history.push(next);
    }
}

/// Final result of a top-level request
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Artifact handed to the sink
    Delivered {
        quality: QualityDescriptor,
        size_bytes: u64,
        attempts: u32,
    },
    /// Oversize, with smaller qualities the caller may pick from
    FallbackAvailable {
        attempted: QualityDescriptor,
        size_bytes: u64,
        candidates: Vec<QualityDescriptor>,
    },
    /// Oversize and nothing smaller exists
    Rejected {
        attempted: QualityDescriptor,
        size_bytes: u64,
        ceiling: u64,
    },
    /// Request ended with an error
    Failed { error: RequestError },
    /// Cancelled by the caller or superseded
    Cancelled,
    /// Cancelled by the request deadline
    TimedOut,
}

impl DownloadOutcome {
    pub fn failed(error: impl Into<RequestError>) -> Self {
        DownloadOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DownloadOutcome::Delivered { .. })
    }

    /// Short label for logs and exit messages
    pub fn label(&self) -> &'static str {
        match self {
            DownloadOutcome::Delivered { .. } => "delivered",
            DownloadOutcome::FallbackAvailable { .. } => "fallback-available",
            DownloadOutcome::Rejected { .. } => "rejected",
            DownloadOutcome::Failed { .. } => "failed",
            DownloadOutcome::Cancelled => "cancelled",
            DownloadOutcome::TimedOut => "timed-out",
        }
    }
}
