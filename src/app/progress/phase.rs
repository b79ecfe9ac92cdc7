//! Percentage to phase label mapping
//!
//! An ordered table of `(minimum threshold, label)` pairs evaluated
//! highest-threshold-first.

use serde::{Deserialize, Serialize};

use crate::constants::progress;

/// One row of the phase table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEntry {
    /// Smallest percentage this label applies to
    pub min_percent: u8,
    /// User-facing label
    pub label: String,
}

/// Ordered threshold table mapping milestones to coarse stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable {
    // Sorted by threshold, highest first
    entries: Vec<PhaseEntry>,
}

impl PhaseTable {
    /// Build a table from arbitrary entries; order does not matter
    ///
    /// Duplicate thresholds keep the last label given.
    pub fn new(entries: impl IntoIterator<Item = PhaseEntry>) -> Self {
        let mut entries: Vec<PhaseEntry> = entries.into_iter().collect();
        entries.sort_by(|a, b| b.min_percent.cmp(&a.min_percent));
        entries.dedup_by(|later, earlier| {
            if later.min_percent == earlier.min_percent {
                earlier.label = later.label.clone();
                true
            } else {
                false
            }
        });
        Self { entries }
    }

    /// Label for a percentage
    ///
    /// Falls back to the lowest entry when no threshold matches, and to
    /// `"transferring"` for an empty table.
    pub fn label_for(&self, percent: u8) -> &str {
        self.entries
            .iter()
            .find(|entry| percent >= entry.min_percent)
            .or_else(|| self.entries.last())
            .map(|entry| entry.label.as_str())
            .unwrap_or(progress::PHASE_TRANSFERRING)
    }

    /// Entries, highest threshold first
    pub fn entries(&self) -> &[PhaseEntry] {
        &self.entries
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::new(
            progress::DEFAULT_PHASES
                .iter()
                .map(|(min_percent, label)| PhaseEntry {
                    min_percent: *min_percent,
                    label: (*label).to_string(),
                }),
        )
    }
}
