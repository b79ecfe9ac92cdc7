//! Progress relay: raw byte counts in, de-duplicated milestones out
//!
//! The relay runs on the cooperative side of the pipeline. It drains the
//! progress channel until the terminal marker (or a cancellation signal),
//! collapses byte counts into integer percentages, and forwards each new
//! milestone to the observer. Observer failures are logged and swallowed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::channel::{ProgressEvent, ProgressReceiver};
use super::phase::PhaseTable;
use super::throttle::ProgressThrottle;
use crate::app::ports::StatusObserver;

/// A percentage checkpoint surfaced to the observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMilestone {
    pub percent: u8,
    pub phase: String,
}

/// Integer percentage for a pair of byte counts
///
/// `None` while the total is unknown. Computed in 128-bit arithmetic and
/// clamped to `[0, 100]`.
pub fn percent_of(transferred: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (u128::from(transferred) * 100) / u128::from(total);
    Some(percent.min(100) as u8)
}

/// Tracks the last emitted milestone and filters out repeats and regressions
#[derive(Debug, Default, Clone)]
pub struct MilestoneTracker {
    last: Option<u8>,
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage to emit for this event, if any
    ///
    /// Does not record it; call [`MilestoneTracker::record`] once emitted.
    pub fn candidate(&self, transferred: u64, total: u64) -> Option<u8> {
        let percent = percent_of(transferred, total)?;
        match self.last {
            Some(last) if percent <= last => None,
            _ => Some(percent),
        }
    }

    /// Remember an emitted milestone
    pub fn record(&mut self, percent: u8) {
        self.last = Some(percent);
    }

    /// Last emitted milestone
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

/// Relay configuration
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Percentage to label mapping
    pub phases: PhaseTable,
    /// Minimum time between observer calls (zero disables); 100% always passes
    pub min_update_interval: Duration,
}

/// Why the relay loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// Terminal marker received
    Terminal,
    /// Cancellation signal received first
    Cancelled,
}

/// Summary of one relay run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub exit: RelayExit,
    /// Progress events consumed from the channel
    pub events_seen: u64,
    /// Milestones handed to the observer, in order
    pub milestones: Vec<u8>,
    /// Observer calls that returned an error
    pub observer_failures: u32,
}

impl RelayReport {
    fn new() -> Self {
        Self {
            exit: RelayExit::Terminal,
            events_seen: 0,
            milestones: Vec::new(),
            observer_failures: 0,
        }
    }
}

/// Consumes a progress channel and reports milestones to an observer
pub struct ProgressRelay {
    config: RelayConfig,
    observer: Arc<dyn StatusObserver>,
}

impl ProgressRelay {
    pub fn new(config: RelayConfig, observer: Arc<dyn StatusObserver>) -> Self {
        Self { config, observer }
    }

    /// Drain `receiver` until the terminal marker or cancellation
    ///
    /// The receiver is dropped on return so a producer blocked on a full
    /// channel is released.
    pub async fn run(
        &self,
        mut receiver: ProgressReceiver,
        cancel: CancellationToken,
    ) -> RelayReport {
        let mut report = RelayReport::new();
        let mut tracker = MilestoneTracker::new();
        let mut throttle = ProgressThrottle::new(self.config.min_update_interval);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.exit = RelayExit::Cancelled;
                    break;
                }
                event = receiver.recv() => event,
            };

            let (transferred, total) = match event {
                Some(ProgressEvent::Progress { transferred, total }) => (transferred, total),
                Some(ProgressEvent::Terminal) | None => {
                    report.exit = RelayExit::Terminal;
                    break;
                }
            };
            report.events_seen += 1;

            let Some(percent) = tracker.candidate(transferred, total) else {
                continue;
            };
            if percent < 100 && !throttle.should_emit() {
                continue;
            }
            tracker.record(percent);

            let milestone = ProgressMilestone {
                percent,
                phase: self.config.phases.label_for(percent).to_string(),
            };
            debug!("Progress milestone {}% ({})", milestone.percent, milestone.phase);
            report.milestones.push(percent);

            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.exit = RelayExit::Cancelled;
                    break;
                }
                result = self.observer.update_status(&milestone.phase, milestone.percent) => result,
            };
            if let Err(e) = delivered {
                report.observer_failures += 1;
                warn!("Observer failed to take progress update: {}", e);
            }
        }

        receiver.close();
        debug!(
            "Progress relay finished ({:?}): {} events, {} milestones",
            report.exit,
            report.events_seen,
            report.milestones.len()
        );
        report
    }
}
