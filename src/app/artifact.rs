//! Artifact lifecycle management
//!
//! The manager owns the downloads directory: it plans artifact paths, verifies
//! what the transfer produced, and hands out [`ArtifactGuard`]s. A guard removes
//! its files exactly once, either when [`ArtifactGuard::dispose`] is called or
//! when it is dropped, so every exit path of a request (success, rejection,
//! error, cancellation, panic) releases disk space.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::models::{ArtifactResult, QualityDescriptor, RequesterId};
use crate::constants::storage;
use crate::errors::{TransferError, TransferResult};

/// Counters describing disposal activity
#[derive(Debug, Default)]
pub struct ArtifactStats {
    disposals: AtomicU64,
    files_removed: AtomicU64,
    removal_failures: AtomicU64,
}

/// Point-in-time copy of [`ArtifactStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactStatsSnapshot {
    /// Guards disposed (each guard counts once)
    pub disposals: u64,
    /// Files actually deleted
    pub files_removed: u64,
    /// Deletions that failed for reasons other than "not found"
    pub removal_failures: u64,
}

impl ArtifactStats {
    pub fn snapshot(&self) -> ArtifactStatsSnapshot {
        ArtifactStatsSnapshot {
            disposals: self.disposals.load(Ordering::SeqCst),
            files_removed: self.files_removed.load(Ordering::SeqCst),
            removal_failures: self.removal_failures.load(Ordering::SeqCst),
        }
    }
}

/// Owner of the downloads directory and the artifacts inside it
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    root: PathBuf,
    extension: String,
    stats: Arc<ArtifactStats>,
}

impl ArtifactManager {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            stats: Arc::new(ArtifactStats::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the downloads directory if needed
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Path an attempt should write to
    ///
    /// The requester is part of the name; with at most one active request per
    /// requester, concurrent attempts never share a path.
    pub fn plan_path(
        &self,
        requester: RequesterId,
        title: &str,
        quality: &QualityDescriptor,
    ) -> PathBuf {
        let file_name = format!(
            "{}_{}_{}.{}",
            sanitize_title(title),
            quality.rank,
            requester.0,
            self.extension
        );
        self.root.join(file_name)
    }

    /// Start tracking a planned path
    pub fn guard(&self, path: impl Into<PathBuf>) -> ArtifactGuard {
        ArtifactGuard {
            paths: vec![path.into()],
            disposed: false,
            stats: self.stats.clone(),
        }
    }

    /// Confirm a transfer produced a file and measure it
    ///
    /// # Errors
    ///
    /// Returns `TransferError::MissingArtifact` if nothing usable is at `path`
    pub async fn verify(
        &self,
        path: &Path,
        quality: &QualityDescriptor,
    ) -> TransferResult<ArtifactResult> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(ArtifactResult {
                path: path.to_path_buf(),
                size_bytes: meta.len(),
                quality: quality.clone(),
                completed_at: Utc::now(),
            }),
            Ok(_) => Err(TransferError::MissingArtifact {
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TransferError::MissingArtifact {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(TransferError::Io(e)),
        }
    }

    pub fn stats(&self) -> ArtifactStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Scoped ownership of one attempt's files
///
/// Disposal is best-effort: removal failures are logged, never raised. Call
/// [`dispose`](Self::dispose) on async paths; dropping an undisposed guard
/// falls back to blocking removal.
#[derive(Debug)]
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
    disposed: bool,
    stats: Arc<ArtifactStats>,
}

impl ArtifactGuard {
    /// Also dispose of `path`, e.g. when the transfer chose its own final name
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Remove every tracked file that exists
    ///
    /// Returns `false` if the guard had already been disposed, in which case
    /// nothing happens.
    pub async fn dispose(&mut self) -> bool {
        if !self.begin_disposal() {
            return false;
        }
        for path in &self.paths {
            let result = tokio::fs::remove_file(path).await;
            self.record_removal(path, result);
        }
        true
    }

    /// Same as [`dispose`](Self::dispose) without yielding to the runtime
    ///
    /// Used from `Drop`, where awaiting is not possible.
    pub fn dispose_blocking(&mut self) -> bool {
        if !self.begin_disposal() {
            return false;
        }
        for path in &self.paths {
            let result = std::fs::remove_file(path);
            self.record_removal(path, result);
        }
        true
    }

    fn begin_disposal(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.stats.disposals.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn record_removal(&self, path: &Path, result: std::io::Result<()>) {
        match result {
            Ok(()) => {
                self.stats.files_removed.fetch_add(1, Ordering::SeqCst);
                info!("Removed artifact {}", path.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Artifact {} already absent", path.display());
            }
            Err(e) => {
                self.stats.removal_failures.fetch_add(1, Ordering::SeqCst);
                warn!("Failed to remove artifact {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if !self.disposed {
            debug!("Artifact guard dropped without explicit disposal");
            self.dispose_blocking();
        }
    }
}

/// Make a title safe to use as a file name
///
/// Path separators, reserved and control characters become `_`; the result is
/// trimmed and truncated. An empty result becomes `"media"`.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(storage::MAX_TITLE_LENGTH)
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        storage::FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}
