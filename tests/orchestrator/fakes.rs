//! Collaborators for driving the orchestrator from tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use media_relay::app::models::{ArtifactResult, QualityDescriptor};
use media_relay::app::ports::{
    DeliverySink, Notice, ProgressCallback, StatusObserver, TransferPrimitive, TransferSpec,
};
use media_relay::errors::{
    DeliveryError, DeliveryResult, ObserverResult, TransferError, TransferResult,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Remembers every milestone and notice
#[derive(Default)]
pub struct RecordingObserver {
    pub milestones: Mutex<Vec<(String, u8)>>,
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingObserver {
    pub fn percents(&self) -> Vec<u8> {
        self.milestones
            .lock()
            .unwrap()
            .iter()
            .map(|(_, percent)| *percent)
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusObserver for RecordingObserver {
    async fn update_status(&self, phase: &str, percent: u8) -> ObserverResult<()> {
        self.milestones
            .lock()
            .unwrap()
            .push((phase.to_string(), percent));
        Ok(())
    }

    async fn notify(&self, notice: Notice) -> ObserverResult<()> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Records deliveries, optionally refusing them
#[derive(Default)]
pub struct CollectingSink {
    pub delivered: Mutex<Vec<(String, u64)>>,
    pub refuse: bool,
}

#[async_trait]
impl DeliverySink for CollectingSink {
    async fn deliver(&self, artifact: &ArtifactResult, title: &str) -> DeliveryResult<()> {
        assert!(artifact.path.exists(), "artifact disposed before delivery");
        if self.refuse {
            return Err(DeliveryError::Rejected {
                reason: "upload refused".to_string(),
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((format!("{}@{}", title, artifact.quality), artifact.size_bytes));
        Ok(())
    }
}

/// Emits a fixed number of progress events, then blocks until cancelled
pub struct StallingPrimitive {
    pub events_before_stall: u64,
    pub stalled: Mutex<Option<oneshot::Sender<()>>>,
}

impl StallingPrimitive {
    pub fn new(events_before_stall: u64) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                events_before_stall,
                stalled: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl TransferPrimitive for StallingPrimitive {
    fn download(
        &self,
        spec: &TransferSpec<'_>,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> TransferResult<PathBuf> {
        std::fs::create_dir_all(spec.destination_dir)?;
        std::fs::write(spec.destination, b"partial download")?;

        for step in 1..=self.events_before_stall {
            on_progress(step * 10, 1000);
        }
        if let Some(tx) = self.stalled.lock().unwrap().take() {
            let _ = tx.send(());
        }

        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(2));
        }
        Err(TransferError::Cancelled)
    }
}

/// Stalls on its first call only and records what each call found on disk
#[derive(Default)]
pub struct SupersedePrimitive {
    pub calls: AtomicUsize,
    /// (quality, other files present in the destination dir at start)
    pub starts: Mutex<Vec<(u32, Vec<PathBuf>)>>,
}

fn other_files(dir: &Path, own: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p != own)
                .collect()
        })
        .unwrap_or_default()
}

impl TransferPrimitive for SupersedePrimitive {
    fn download(
        &self,
        spec: &TransferSpec<'_>,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> TransferResult<PathBuf> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(spec.destination_dir)?;
        self.starts.lock().unwrap().push((
            spec.quality.rank,
            other_files(spec.destination_dir, spec.destination),
        ));

        std::fs::write(spec.destination, vec![1u8; 64])?;
        on_progress(32, 64);

        if call == 0 {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(2));
            }
            return Err(TransferError::Cancelled);
        }

        on_progress(64, 64);
        Ok(spec.destination.to_path_buf())
    }
}

/// Always fails after writing part of the file
pub struct BrokenPrimitive;

impl TransferPrimitive for BrokenPrimitive {
    fn download(
        &self,
        spec: &TransferSpec<'_>,
        _cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> TransferResult<PathBuf> {
        std::fs::create_dir_all(spec.destination_dir)?;
        std::fs::write(spec.destination, b"half")?;
        on_progress(4, 8);
        Err(TransferError::Transport {
            reason: "connection reset by peer".to_string(),
        })
    }
}

pub fn q(rank: u32) -> QualityDescriptor {
    QualityDescriptor::new(rank.to_string(), rank)
}

/// Create `<dir>/<rank>.mp4` files of the given sizes
pub fn write_variants(dir: &Path, variants: &[(u32, usize)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (rank, size) in variants {
        let content: Vec<u8> = (0..*size).map(|i| (i % 253) as u8).collect();
        std::fs::write(dir.join(format!("{}.mp4", rank)), content).unwrap();
    }
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
