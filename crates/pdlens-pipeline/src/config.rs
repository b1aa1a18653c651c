//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Default ceiling on visible updates per second
pub const DEFAULT_MAX_UPDATES_PER_SECOND: u32 = 10;

/// Highest accepted update rate (one pass per millisecond)
pub const MAX_UPDATES_PER_SECOND: u32 = 1000;

/// Default report queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum decode/update passes per second
    pub max_updates_per_second: u32,
    /// Maximum number of undecoded reports held before the oldest is evicted
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_updates_per_second: DEFAULT_MAX_UPDATES_PER_SECOND,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with the given update rate and default capacity
    pub fn with_rate(max_updates_per_second: u32) -> Self {
        Self {
            max_updates_per_second,
            ..Default::default()
        }
    }

    /// Check that the configuration can drive a pipeline
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_updates_per_second == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_updates_per_second must be at least 1".to_string(),
            ));
        }
        if self.max_updates_per_second > MAX_UPDATES_PER_SECOND {
            return Err(PipelineError::InvalidConfig(format!(
                "max_updates_per_second must be at most {}",
                MAX_UPDATES_PER_SECOND
            )));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum spacing between two decode passes
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_updates_per_second.max(1)
    }

    /// Coalescing window for arrival notifications (a tenth of the update interval)
    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(100) / self.max_updates_per_second.max(1)
    }
}
