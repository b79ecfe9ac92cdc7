//! Observer call pacing
//!
//! Some observers (chat message edits, remote dashboards) reject updates that
//! arrive too quickly. The relay consults a [`ProgressThrottle`] before every
//! non-final milestone.

use std::time::{Duration, Instant};

/// Minimum spacing between observer calls
///
/// A zero interval disables pacing.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl ProgressThrottle {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    /// Claim the next slot if it is open
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    fn should_emit_at(&mut self, now: Instant) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        if matches!(self.next_allowed, Some(next) if now < next) {
            return false;
        }
        self.next_allowed = Some(now + self.interval);
        true
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
