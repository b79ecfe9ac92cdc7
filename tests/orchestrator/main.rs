//! Integration tests for the download orchestrator
//!
//! These tests run whole requests through the orchestrator and registry,
//! using the local directory collaborators where real files are needed and
//! scripted primitives where timing has to be controlled.

mod fakes;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use fakes::*;
use media_relay::app::local::{DirectorySink, DirectorySource, LocalCopyTransfer};
use media_relay::app::models::{RequesterId, SourceHandle};
use media_relay::app::orchestrator::{
    DownloadOrchestrator, DownloadOutcome, FallbackMode, OrchestratorConfig, RequestRegistry,
};
use media_relay::app::ports::{Notice, TransferPrimitive};
use media_relay::errors::{DeliveryError, RequestError, TransferError};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const KIB: u64 = 1024;

fn source_handle(dir: &Path) -> SourceHandle {
    SourceHandle::new(dir.to_string_lossy().into_owned())
}

fn local_orchestrator(
    root: &TempDir,
    config: OrchestratorConfig,
    observer: Arc<RecordingObserver>,
) -> DownloadOrchestrator {
    DownloadOrchestrator::new(
        config.with_downloads_dir(root.path().join("downloads")),
        Arc::new(DirectorySource),
        Arc::new(LocalCopyTransfer::new().with_buffer_size(4 * KIB as usize)),
        observer,
        Arc::new(DirectorySink::new(root.path().join("out"))),
    )
}

fn scripted_orchestrator(
    root: &TempDir,
    primitive: Arc<dyn TransferPrimitive>,
    observer: Arc<RecordingObserver>,
    sink: Arc<CollectingSink>,
) -> DownloadOrchestrator {
    DownloadOrchestrator::new(
        OrchestratorConfig::default().with_downloads_dir(root.path().join("downloads")),
        Arc::new(DirectorySource),
        primitive,
        observer,
        sink,
    )
}

#[tokio::test]
async fn test_local_delivery_with_auto_fallback() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("sunset");
    write_variants(&source_dir, &[(1080, 200 * 1024), (720, 60 * 1024), (480, 20 * 1024)]);

    let observer = Arc::new(RecordingObserver::default());
    let config = OrchestratorConfig::default()
        .with_size_ceiling(100 * KIB)
        .with_fallback_mode(FallbackMode::Auto);
    let orchestrator = local_orchestrator(&root, config, observer.clone());

    let outcome = orchestrator
        .fetch(
            RequesterId(1),
            source_handle(&source_dir),
            q(1080),
            CancellationToken::new(),
        )
        .await;

    match outcome {
        DownloadOutcome::Delivered {
            quality,
            size_bytes,
            attempts,
        } => {
            assert_eq!(quality.rank, 720);
            assert_eq!(size_bytes, 60 * KIB);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let delivered = root.path().join("out").join("sunset_720.mp4");
    assert_eq!(
        std::fs::read(&delivered).unwrap(),
        std::fs::read(source_dir.join("720.mp4")).unwrap()
    );

    // Both attempts cleaned up after themselves
    assert_eq!(file_count(&root.path().join("downloads")), 0);
    let stats = orchestrator.artifacts().stats();
    assert_eq!(stats.disposals, 2);
    assert_eq!(stats.removal_failures, 0);

    // Each attempt restarts its milestones from 0 and ends at 100
    let percents = observer.percents();
    let runs: Vec<&[u8]> = percents.split(|p| *p == 0).filter(|r| !r.is_empty()).collect();
    assert_eq!(runs.len(), 2);
    for run in runs {
        assert!(run.windows(2).all(|w| w[0] < w[1]), "{:?}", run);
        assert_eq!(run.last(), Some(&100));
    }
}

#[tokio::test]
async fn test_prompt_mode_reports_candidates_and_cleans_up() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("clip");
    write_variants(
        &source_dir,
        &[(1080, 200 * 1024), (720, 60 * 1024), (480, 20 * 1024), (240, 5 * 1024)],
    );

    let observer = Arc::new(RecordingObserver::default());
    let config = OrchestratorConfig::default().with_size_ceiling(100 * KIB);
    let orchestrator = local_orchestrator(&root, config, observer.clone());

    let outcome = orchestrator
        .fetch(
            RequesterId(2),
            source_handle(&source_dir),
            q(1080),
            CancellationToken::new(),
        )
        .await;

    match outcome {
        DownloadOutcome::FallbackAvailable {
            attempted,
            size_bytes,
            candidates,
        } => {
            assert_eq!(attempted.rank, 1080);
            assert_eq!(size_bytes, 200 * KIB);
            assert_eq!(candidates, vec![q(720), q(480), q(240)]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(file_count(&root.path().join("downloads")), 0);
    assert_eq!(file_count(&root.path().join("out")), 0);
    assert!(matches!(
        observer.notices().last(),
        Some(Notice::Oversize { .. })
    ));
}

#[tokio::test]
async fn test_lowest_quality_oversize_is_rejected() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("clip");
    write_variants(&source_dir, &[(480, 150 * 1024), (240, 101 * 1024)]);

    let observer = Arc::new(RecordingObserver::default());
    let config = OrchestratorConfig::default()
        .with_size_ceiling(100 * KIB)
        .with_fallback_mode(FallbackMode::Auto);
    let orchestrator = local_orchestrator(&root, config, observer.clone());

    let outcome = orchestrator
        .fetch(
            RequesterId(3),
            source_handle(&source_dir),
            q(480),
            CancellationToken::new(),
        )
        .await;

    match outcome {
        DownloadOutcome::Rejected {
            attempted,
            size_bytes,
            ceiling,
        } => {
            assert_eq!(attempted.rank, 240);
            assert_eq!(size_bytes, 101 * KIB);
            assert_eq!(ceiling, 100 * KIB);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(orchestrator.artifacts().stats().disposals, 2);
    assert_eq!(file_count(&root.path().join("downloads")), 0);
}

#[tokio::test]
async fn test_cancellation_mid_transfer_disposes_artifact() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("clip");
    write_variants(&source_dir, &[(720, 10)]);

    let (primitive, stalled) = StallingPrimitive::new(3);
    let observer = Arc::new(RecordingObserver::default());
    let sink = Arc::new(CollectingSink::default());
    let orchestrator = Arc::new(scripted_orchestrator(
        &root,
        Arc::new(primitive),
        observer.clone(),
        sink.clone(),
    ));

    let cancel = CancellationToken::new();
    let task = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        let source = source_handle(&source_dir);
        tokio::spawn(async move { orchestrator.fetch(RequesterId(4), source, q(720), cancel).await })
    };

    stalled.await.unwrap();
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("request did not stop after cancellation")
        .unwrap();

    assert!(matches!(outcome, DownloadOutcome::Cancelled));
    assert!(observer.percents().len() <= 3);
    assert!(sink.delivered.lock().unwrap().is_empty());
    assert_eq!(orchestrator.artifacts().stats().disposals, 1);
    assert_eq!(file_count(&root.path().join("downloads")), 0);
}

#[tokio::test]
async fn test_superseded_request_is_disposed_before_next_starts() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("clip");
    write_variants(&source_dir, &[(720, 10), (480, 10)]);

    let primitive = Arc::new(SupersedePrimitive::default());
    let observer = Arc::new(RecordingObserver::default());
    let sink = Arc::new(CollectingSink::default());
    let orchestrator = scripted_orchestrator(&root, primitive.clone(), observer, sink.clone());
    let registry = RequestRegistry::new(Arc::new(orchestrator));

    let requester = RequesterId(5);
    let first = registry
        .submit(requester, source_handle(&source_dir), q(720))
        .await;

    // Wait until the first transfer is on disk and stalled
    tokio::time::timeout(Duration::from_secs(5), async {
        while primitive.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();

    let second = registry
        .submit(requester, source_handle(&source_dir), q(480))
        .await;

    assert!(matches!(first.outcome().await, DownloadOutcome::Cancelled));
    assert!(matches!(
        second.outcome().await,
        DownloadOutcome::Delivered { .. }
    ));

    let starts = primitive.starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 2);
    assert_eq!(starts[1].0, 480);
    assert!(
        starts[1].1.is_empty(),
        "first artifact still present: {:?}",
        starts[1].1
    );

    assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    assert_eq!(registry.orchestrator().artifacts().stats().disposals, 2);
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn test_delivery_failure_still_disposes() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("clip");
    write_variants(&source_dir, &[(720, 2048)]);

    let observer = Arc::new(RecordingObserver::default());
    let sink = Arc::new(CollectingSink {
        refuse: true,
        ..Default::default()
    });
    let orchestrator = scripted_orchestrator(
        &root,
        Arc::new(LocalCopyTransfer::new()),
        observer.clone(),
        sink,
    );

    let outcome = orchestrator
        .fetch(
            RequesterId(6),
            source_handle(&source_dir),
            q(720),
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        outcome,
        DownloadOutcome::Failed {
            error: RequestError::Delivery(DeliveryError::Rejected { .. })
        }
    ));
    assert_eq!(orchestrator.artifacts().stats().disposals, 1);
    assert_eq!(file_count(&root.path().join("downloads")), 0);
    assert!(matches!(
        observer.notices().last(),
        Some(Notice::Failed { .. })
    ));
}

#[tokio::test]
async fn test_transfer_failure_removes_partial_file() {
    let root = TempDir::new().unwrap();
    let source_dir = root.path().join("clip");
    write_variants(&source_dir, &[(720, 8)]);

    let observer = Arc::new(RecordingObserver::default());
    let sink = Arc::new(CollectingSink::default());
    let orchestrator =
        scripted_orchestrator(&root, Arc::new(BrokenPrimitive), observer, sink.clone());

    let outcome = orchestrator
        .fetch(
            RequesterId(7),
            source_handle(&source_dir),
            q(720),
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        outcome,
        DownloadOutcome::Failed {
            error: RequestError::Transfer(TransferError::Transport { .. })
        }
    ));
    assert!(sink.delivered.lock().unwrap().is_empty());
    assert_eq!(file_count(&root.path().join("downloads")), 0);
}

#[tokio::test]
async fn test_requesters_run_concurrently() {
    let root = TempDir::new().unwrap();
    let sources: Vec<_> = (0..4)
        .map(|i| {
            let dir = root.path().join(format!("clip{}", i));
            write_variants(&dir, &[(720, 32 * 1024), (480, 16 * 1024)]);
            dir
        })
        .collect();

    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = local_orchestrator(&root, OrchestratorConfig::default(), observer);
    let registry = RequestRegistry::new(Arc::new(orchestrator));

    let mut handles = Vec::new();
    for (id, dir) in sources.iter().enumerate() {
        let quality = if id % 2 == 0 { q(720) } else { q(480) };
        handles.push(
            registry
                .submit(RequesterId(100 + id as u64), source_handle(dir), quality)
                .await,
        );
    }

    for handle in handles {
        assert!(handle.outcome().await.is_delivered());
    }
    assert_eq!(registry.orchestrator().artifacts().stats().disposals, 4);
    assert_eq!(file_count(&root.path().join("downloads")), 0);
    assert_eq!(file_count(&root.path().join("out")), 4);
}
