//! Application constants for Media Relay
//!
//! This module centralizes the constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Delivery size policy
pub mod policy {
    /// Hard ceiling for a deliverable artifact (50 MiB)
    pub const DEFAULT_SIZE_CEILING_BYTES: u64 = 50 * 1024 * 1024;

    /// Upper bound on automatic fallback attempts per top-level request
    pub const MAX_FALLBACK_ATTEMPTS: u32 = 8;
}

/// Transfer worker configuration
pub mod transfer {
    /// Default number of concurrent chunk workers inside the primitive
    pub const DEFAULT_WORKER_COUNT: usize = 8;

    /// Maximum accepted chunk worker count
    pub const MAX_WORKER_COUNT: usize = 64;

    /// Copy buffer size for the local primitive (64KB)
    pub const COPY_BUFFER_SIZE: usize = 64 * 1024;
}

/// Progress channel and relay configuration
pub mod progress {
    /// Capacity of the bounded progress channel
    pub const CHANNEL_CAPACITY: usize = 64;

    /// Phase label while bytes are arriving
    pub const PHASE_TRANSFERRING: &str = "transferring";

    /// Phase label for the middle of the transfer
    pub const PHASE_PROCESSING: &str = "processing";

    /// Phase label for the tail of the transfer
    pub const PHASE_FINALIZING: &str = "finalizing";

    /// Phase label once everything has arrived
    pub const PHASE_READY: &str = "ready";

    /// Default (minimum threshold, label) table
    pub const DEFAULT_PHASES: [(u8, &str); 4] = [
        (0, PHASE_TRANSFERRING),
        (30, PHASE_PROCESSING),
        (70, PHASE_FINALIZING),
        (100, PHASE_READY),
    ];
}

/// Artifact storage
pub mod storage {
    /// Default downloads directory, relative to the working directory
    pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

    /// Default container extension for artifacts
    pub const DEFAULT_EXTENSION: &str = "mp4";

    /// Title used when sanitization leaves nothing
    pub const FALLBACK_TITLE: &str = "media";

    /// Maximum title length kept in artifact file names
    pub const MAX_TITLE_LENGTH: usize = 120;
}

/// Orchestrator lifecycle
pub mod orchestrator {
    use super::Duration;

    /// Maximum time to wait for in-flight requests during shutdown
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

// Re-export commonly used constants for convenience
pub use policy::DEFAULT_SIZE_CEILING_BYTES;
pub use progress::CHANNEL_CAPACITY;
pub use transfer::DEFAULT_WORKER_COUNT;
