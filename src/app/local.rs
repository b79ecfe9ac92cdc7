//! Local-filesystem collaborators
//!
//! Reference implementations of the boundary traits that need no network:
//!
//! - [`DirectorySource`] treats a directory as a media source. Every file whose
//!   stem is a quality label (`720.mp4`, `1920x1080.mp4`) is one available
//!   quality; the directory name is the title.
//! - [`LocalCopyTransfer`] is a blocking transfer primitive that copies the
//!   chosen variant using several threads over contiguous byte ranges.
//! - [`DirectorySink`] delivers a finished artifact by copying it into an
//!   output directory.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::artifact::sanitize_title;
use crate::app::models::{ArtifactResult, QualityDescriptor, ResolvedSource, SourceHandle};
use crate::app::ports::{
    DeliverySink, ProgressCallback, SourceResolver, TransferPrimitive, TransferSpec,
};
use crate::constants::transfer;
use crate::errors::{
    DeliveryError, DeliveryResult, ResolveError, ResolveResult, TransferError, TransferResult,
};

/// Find the file in `dir` whose stem is exactly the quality label
pub fn find_variant(dir: &Path, quality: &QualityDescriptor) -> std::io::Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) == Some(quality.id.as_str()) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Directory-backed source resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectorySource;

#[async_trait]
impl SourceResolver for DirectorySource {
    async fn resolve(&self, source: &SourceHandle) -> ResolveResult<ResolvedSource> {
        let dir = PathBuf::from(source.as_str());
        let meta = match tokio::fs::metadata(&dir).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResolveError::NotFound {
                    source_handle: source.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            return Err(ResolveError::NotFound {
                source_handle: source.to_string(),
            });
        }

        let mut qualities = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match QualityDescriptor::parse(stem) {
                Ok(quality) => qualities.push(quality),
                Err(_) => debug!("Ignoring non-variant file {}", path.display()),
            }
        }

        if qualities.is_empty() {
            return Err(ResolveError::NoQualities {
                source_handle: source.to_string(),
            });
        }
        qualities.sort_by(|a, b| b.cmp(a));

        let title = dir
            .canonicalize()
            .unwrap_or_else(|_| dir.clone())
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| source.to_string());

        debug!("Resolved {} to {} qualities", source, qualities.len());
        Ok(ResolvedSource { title, qualities })
    }
}

/// Blocking, multi-threaded file copy reporting cumulative progress
#[derive(Debug, Clone)]
pub struct LocalCopyTransfer {
    buffer_size: usize,
    pacing: Option<Duration>,
}

impl Default for LocalCopyTransfer {
    fn default() -> Self {
        Self {
            buffer_size: transfer::COPY_BUFFER_SIZE,
            pacing: None,
        }
    }
}

impl LocalCopyTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-read buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Sleep after every buffer, simulating a slow link
    pub fn with_pacing(mut self, delay: Duration) -> Self {
        self.pacing = Some(delay);
        self
    }

    fn copy_range(
        &self,
        source: &Path,
        destination: &Path,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
        report: &(dyn Fn(u64) + Sync),
    ) -> TransferResult<()> {
        let mut input = File::open(source)?;
        let mut output = OpenOptions::new().write(true).open(destination)?;
        input.seek(SeekFrom::Start(start))?;
        output.seek(SeekFrom::Start(start))?;

        let mut buffer = vec![0u8; self.buffer_size];
        let mut remaining = end - start;
        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let want = remaining.min(buffer.len() as u64) as usize;
            let read = input.read(&mut buffer[..want])?;
            if read == 0 {
                return Err(TransferError::Transport {
                    reason: format!("source {} shrank during copy", source.display()),
                });
            }
            output.write_all(&buffer[..read])?;
            remaining -= read as u64;
            report(read as u64);

            if let Some(delay) = self.pacing {
                std::thread::sleep(delay);
            }
        }
        output.flush()?;
        Ok(())
    }
}

impl TransferPrimitive for LocalCopyTransfer {
    fn download(
        &self,
        spec: &TransferSpec<'_>,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> TransferResult<PathBuf> {
        let source_dir = Path::new(spec.source.as_str());
        let source = find_variant(source_dir, spec.quality)?.ok_or_else(|| {
            TransferError::Transport {
                reason: format!("{} has no {} variant", spec.source, spec.quality),
            }
        })?;

        std::fs::create_dir_all(spec.destination_dir)?;
        let total = std::fs::metadata(&source)?.len();
        let output = File::create(spec.destination)?;
        output.set_len(total)?;
        drop(output);

        on_progress(0, total);
        if total == 0 {
            return Ok(spec.destination.to_path_buf());
        }

        let workers = spec
            .worker_count
            .clamp(1, transfer::MAX_WORKER_COUNT)
            .min(total as usize) as u64;
        let chunk = (total + workers - 1) / workers;
        debug!(
            "Copying {} ({} bytes) with {} workers, {} bytes each",
            source.display(),
            total,
            workers,
            chunk
        );

        // Held across the callback so reported totals never go backwards
        let done = Mutex::new(0u64);
        let report = |bytes: u64| {
            let mut done = done.lock().unwrap_or_else(|e| e.into_inner());
            *done += bytes;
            on_progress(*done, total);
        };

        let source = source.as_path();
        let destination = spec.destination;
        let report = &report;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|i| {
                    let start = i * chunk;
                    let end = (start + chunk).min(total);
                    scope.spawn(move || {
                        if start >= end {
                            return Ok(());
                        }
                        self.copy_range(source, destination, start, end, cancel, report)
                    })
                })
                .collect();

            let mut first_error = None;
            for handle in handles {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(TransferError::Panicked {
                        reason: "chunk worker panicked".to_string(),
                    })
                });
                if let Err(e) = result {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })?;

        info!("Copied {} bytes to {}", total, destination.display());
        Ok(destination.to_path_buf())
    }
}

/// Delivers artifacts by copying them into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    output_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where an artifact with this title would be delivered
    pub fn target_path(&self, artifact: &ArtifactResult, title: &str) -> PathBuf {
        let extension = artifact
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        self.output_dir.join(format!(
            "{}_{}.{}",
            sanitize_title(title),
            sanitize_title(&artifact.quality.id),
            extension
        ))
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    async fn deliver(&self, artifact: &ArtifactResult, title: &str) -> DeliveryResult<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let target = self.target_path(artifact, title);
        let copied = tokio::fs::copy(&artifact.path, &target).await?;
        if copied != artifact.size_bytes {
            return Err(DeliveryError::Rejected {
                reason: format!(
                    "copied {} bytes, expected {}",
                    copied, artifact.size_bytes
                ),
            });
        }
        info!("Delivered {} to {}", title, target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    fn write_variant(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_directory_source_lists_qualities() {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("sunset");
        std::fs::create_dir_all(&source_dir).unwrap();
        write_variant(&source_dir, "1920x1080.mp4", 10);
        write_variant(&source_dir, "480.mp4", 10);
        write_variant(&source_dir, "thumbnail.jpg", 10);

        let handle = SourceHandle::new(source_dir.to_string_lossy());
        let resolved = DirectorySource.resolve(&handle).await.unwrap();

        assert_eq!(resolved.title, "sunset");
        let ranks: Vec<u32> = resolved.qualities.iter().map(|q| q.rank).collect();
        assert_eq!(ranks, vec![1080, 480]);
    }

    #[tokio::test]
    async fn test_directory_source_errors() {
        let dir = TempDir::new().unwrap();
        let missing = SourceHandle::new(dir.path().join("nope").to_string_lossy());
        assert!(matches!(
            DirectorySource.resolve(&missing).await,
            Err(ResolveError::NotFound { .. })
        ));

        let empty_dir = dir.path().join("empty");
        std::fs::create_dir_all(&empty_dir).unwrap();
        let empty = SourceHandle::new(empty_dir.to_string_lossy());
        assert!(matches!(
            DirectorySource.resolve(&empty).await,
            Err(ResolveError::NoQualities { .. })
        ));
    }

    #[test]
    fn test_parallel_copy_is_exact_and_monotonic() {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("clip");
        std::fs::create_dir_all(&source_dir).unwrap();
        let original = write_variant(&source_dir, "720.mp4", 100_003);

        let handle = SourceHandle::new(source_dir.to_string_lossy());
        let quality = QualityDescriptor::new("720", 720);
        let out_dir = dir.path().join("downloads");
        let destination = out_dir.join("clip_720_1.mp4");
        let spec = TransferSpec {
            source: &handle,
            quality: &quality,
            destination_dir: &out_dir,
            destination: &destination,
            worker_count: 8,
        };

        let seen = StdMutex::new(Vec::new());
        let on_progress = |transferred: u64, total: u64| {
            seen.lock().unwrap().push((transferred, total));
        };

        let primitive = LocalCopyTransfer::new().with_buffer_size(4096);
        let path = primitive
            .download(&spec, &CancellationToken::new(), &on_progress)
            .unwrap();

        assert_eq!(path, destination);
        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&original).unwrap());

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&(0, 100_003)));
        assert_eq!(seen.last(), Some(&(100_003, 100_003)));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_cancelled_copy_stops() {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("clip");
        std::fs::create_dir_all(&source_dir).unwrap();
        write_variant(&source_dir, "720.mp4", 10_000);

        let handle = SourceHandle::new(source_dir.to_string_lossy());
        let quality = QualityDescriptor::new("720", 720);
        let out_dir = dir.path().join("downloads");
        let destination = out_dir.join("clip.mp4");
        let spec = TransferSpec {
            source: &handle,
            quality: &quality,
            destination_dir: &out_dir,
            destination: &destination,
            worker_count: 2,
        };

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = LocalCopyTransfer::new().download(&spec, &cancel, &|_: u64, _: u64| {});
        assert!(matches!(result, Err(TransferError::Cancelled)));
    }

    #[test]
    fn test_missing_variant_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let handle = SourceHandle::new(dir.path().to_string_lossy());
        let quality = QualityDescriptor::new("720", 720);
        let destination = dir.path().join("out.mp4");
        let spec = TransferSpec {
            source: &handle,
            quality: &quality,
            destination_dir: dir.path(),
            destination: &destination,
            worker_count: 1,
        };

        let result = LocalCopyTransfer::new().download(&spec, &CancellationToken::new(), &|_: u64, _: u64| {});
        assert!(matches!(result, Err(TransferError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_directory_sink_copies_artifact() {
        let dir = TempDir::new().unwrap();
        let artifact_path = write_variant(dir.path(), "artifact.mp4", 2048);
        let artifact = ArtifactResult {
            path: artifact_path,
            size_bytes: 2048,
            quality: QualityDescriptor::new("1280x720", 720),
            completed_at: Utc::now(),
        };

        let sink = DirectorySink::new(dir.path().join("out"));
        sink.deliver(&artifact, "Sunset / Bay").await.unwrap();

        let target = sink.target_path(&artifact, "Sunset / Bay");
        assert_eq!(target.file_name().unwrap(), "Sunset _ Bay_1280x720.mp4");
        assert_eq!(std::fs::metadata(target).unwrap().len(), 2048);
    }
}
