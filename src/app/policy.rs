//! Size policy and fallback selection
//!
//! A finished artifact is deliverable only if it fits under the configured
//! ceiling. Oversize artifacts produce a list of strictly smaller qualities,
//! closest to the requested quality first, so repeated fallbacks always converge.

use tracing::debug;

use crate::app::models::{ArtifactResult, QualityDescriptor};
use crate::constants::policy;

/// Outcome of evaluating a finished artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeDecision {
    /// Fits under the ceiling
    Deliverable(ArtifactResult),
    /// Too large; smaller qualities exist, sorted by rank descending
    Oversize {
        artifact: ArtifactResult,
        candidates: Vec<QualityDescriptor>,
    },
    /// Too large and nothing smaller is available
    OversizeExhausted { artifact: ArtifactResult },
}

impl SizeDecision {
    pub fn artifact(&self) -> &ArtifactResult {
        match self {
            SizeDecision::Deliverable(artifact)
            | SizeDecision::Oversize { artifact, .. }
            | SizeDecision::OversizeExhausted { artifact } => artifact,
        }
    }

    pub fn is_deliverable(&self) -> bool {
        matches!(self, SizeDecision::Deliverable(_))
    }
}

/// Fixed size ceiling with deterministic fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    ceiling_bytes: u64,
}

impl SizePolicy {
    pub fn new(ceiling_bytes: u64) -> Self {
        Self { ceiling_bytes }
    }

    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_bytes
    }

    /// Decide what to do with a finished artifact
    pub fn evaluate(
        &self,
        artifact: ArtifactResult,
        requested: &QualityDescriptor,
        available: &[QualityDescriptor],
    ) -> SizeDecision {
        if artifact.size_bytes <= self.ceiling_bytes {
            return SizeDecision::Deliverable(artifact);
        }

        let candidates = fallback_candidates(requested, available);
        debug!(
            "Artifact {} bytes exceeds ceiling {} at {}; {} smaller candidates",
            artifact.size_bytes,
            self.ceiling_bytes,
            requested,
            candidates.len()
        );

        if candidates.is_empty() {
            SizeDecision::OversizeExhausted { artifact }
        } else {
            SizeDecision::Oversize {
                artifact,
                candidates,
            }
        }
    }
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self::new(policy::DEFAULT_SIZE_CEILING_BYTES)
    }
}

/// Qualities strictly below `requested`, one per rank, highest rank first
pub fn fallback_candidates(
    requested: &QualityDescriptor,
    available: &[QualityDescriptor],
) -> Vec<QualityDescriptor> {
    let mut candidates: Vec<QualityDescriptor> = available
        .iter()
        .filter(|q| q.is_below(requested))
        .cloned()
        .collect();

    // Stable sort keeps the source's first label for each rank
    candidates.sort_by(|a, b| b.rank.cmp(&a.rank));
    candidates.dedup_by(|later, earlier| later.rank == earlier.rank);
    candidates
}
