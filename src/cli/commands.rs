//! Command handlers for the CLI
//!
//! Each handler wires the local reference collaborators into a
//! [`DownloadOrchestrator`] and turns the outcome into terminal output and an
//! exit status.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::local::{DirectorySink, DirectorySource, LocalCopyTransfer};
use crate::app::models::{QualityDescriptor, RequesterId, SourceHandle};
use crate::app::orchestrator::{
    DownloadOrchestrator, DownloadOutcome, FallbackMode, OrchestratorConfig, RequestRegistry,
};
use crate::app::ports::SourceResolver;
use crate::cli::args::{FetchArgs, QualitiesArgs};
use crate::cli::progress::TerminalObserver;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// The CLI runs a single requester
const CLI_REQUESTER: RequesterId = RequesterId(0);

/// Apply command-line overrides on top of the loaded configuration
pub fn build_runtime_config(config: &AppConfig, args: &FetchArgs) -> OrchestratorConfig {
    let mut runtime = config.to_runtime_config();

    if args.auto_fallback {
        runtime.fallback_mode = FallbackMode::Auto;
    }
    if let Some(workers) = args.workers {
        runtime.transfer.worker_count = workers;
    }
    if let Some(timeout) = args.timeout {
        runtime.request_timeout = Some(timeout);
    }
    if let Some(mib) = args.max_size_mib {
        runtime.size_ceiling_bytes = mib.saturating_mul(1024 * 1024);
    }
    runtime
}

/// Handle the fetch command
pub async fn handle_fetch(args: FetchArgs, config: AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let runtime = build_runtime_config(&config, &args);
    runtime.validate().map_err(AppError::generic)?;
    let quality = QualityDescriptor::parse(&args.quality)?;
    let output_dir: PathBuf = args
        .output
        .clone()
        .unwrap_or_else(|| config.storage.output_dir.clone());

    info!(
        "Fetching {} at {} into {}",
        args.source,
        quality,
        output_dir.display()
    );

    let orchestrator = DownloadOrchestrator::new(
        runtime,
        Arc::new(DirectorySource),
        Arc::new(LocalCopyTransfer::new()),
        Arc::new(TerminalObserver::new(quiet)),
        Arc::new(DirectorySink::new(&output_dir)),
    );
    let registry = Arc::new(RequestRegistry::new(Arc::new(orchestrator)));

    let handle = registry
        .submit(CLI_REQUESTER, SourceHandle::new(args.source.clone()), quality)
        .await;

    let signal_registry = registry.clone();
    let signals = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, cancelling download");
                signal_registry.shutdown().await;
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    let outcome = handle.outcome().await;
    signals.abort();

    report_outcome(outcome, &args, &output_dir, quiet)
}

fn report_outcome(
    outcome: DownloadOutcome,
    args: &FetchArgs,
    output_dir: &std::path::Path,
    quiet: bool,
) -> Result<()> {
    match outcome {
        DownloadOutcome::Delivered {
            quality,
            size_bytes,
            attempts,
        } => {
            if !quiet {
                println!(
                    "✅ Delivered {} at {} ({:.1} MiB) to {}",
                    args.source,
                    quality,
                    size_bytes as f64 / (1024.0 * 1024.0),
                    output_dir.display()
                );
                if attempts > 1 {
                    println!("   Fell back from {} after {} attempts", args.quality, attempts);
                }
            }
            Ok(())
        }
        DownloadOutcome::FallbackAvailable {
            attempted,
            candidates,
            ..
        } => {
            let options: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
            Err(AppError::generic(format!(
                "{} is over the size limit at {}. Try --quality {} or --auto-fallback (available: {})",
                args.source,
                attempted,
                options.first().map(String::as_str).unwrap_or("?"),
                options.join(", ")
            )))
        }
        DownloadOutcome::Rejected {
            attempted,
            size_bytes,
            ceiling,
        } => Err(AppError::generic(format!(
            "{} at {} is {} bytes, over the {} byte limit, and no smaller quality exists",
            args.source, attempted, size_bytes, ceiling
        ))),
        DownloadOutcome::Failed { error } => Err(error.into()),
        DownloadOutcome::Cancelled => Err(AppError::generic("Download cancelled")),
        DownloadOutcome::TimedOut => Err(AppError::generic("Download timed out")),
    }
}

/// Handle the qualities command
pub async fn handle_qualities(args: QualitiesArgs) -> Result<()> {
    let source = SourceHandle::new(args.source);
    let resolved = DirectorySource.resolve(&source).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&resolved)
            .map_err(|e| AppError::generic(format!("Failed to encode qualities: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    println!("{} ({} qualities)", resolved.title, resolved.qualities.len());
    for quality in &resolved.qualities {
        println!("  {:>6}  rank {}", quality.id, quality.rank);
    }
    Ok(())
}

/// Handle the init command
pub async fn handle_init() -> Result<()> {
    match AppConfig::initialize_first_run().await? {
        Some(path) => println!("Configuration file: {}", path.display()),
        None => println!("No configuration file was written"),
    }
    Ok(())
}
