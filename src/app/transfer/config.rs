//! Transfer worker configuration

use serde::{Deserialize, Serialize};

use crate::constants::{progress, transfer};

/// Configuration for the transfer worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Chunk parallelism passed to the transfer primitive
    pub worker_count: usize,
    /// Capacity of the progress channel
    pub channel_capacity: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            worker_count: transfer::DEFAULT_WORKER_COUNT,
            channel_capacity: progress::CHANNEL_CAPACITY,
        }
    }
}

impl TransferConfig {
    /// Set the chunk worker count
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the progress channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("Worker count must be at least 1".to_string());
        }

        if self.worker_count > transfer::MAX_WORKER_COUNT {
            return Err(format!(
                "Worker count {} exceeds maximum of {}",
                self.worker_count,
                transfer::MAX_WORKER_COUNT
            ));
        }

        if self.channel_capacity == 0 {
            return Err("Progress channel capacity cannot be zero".to_string());
        }

        Ok(())
    }
}
