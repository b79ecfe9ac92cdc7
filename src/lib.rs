//! Media Relay Library
//!
//! Download orchestration for a chat-driven media relay: a blocking transfer
//! runs off the async runtime while its progress is relayed as milestones,
//! finished files are checked against a size ceiling with lower-quality
//! fallback, and every artifact is removed once the request ends.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
