//! Out-of-band removal of expired clips.
//!
//! The sweeper is not part of the frame loop; it is invoked on demand
//! (for example by the `cleanup` command or a scheduler).

mod sweeper;

pub use sweeper::{FsRetentionSweeper, RetentionSweeper, SweepError};

use crate::capture::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Clips older than this many days are deleted.
    pub max_age_days: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { max_age_days: 7 }
    }
}

impl RetentionConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_age_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retention.max_age_days",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Retention window as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 86_400)
    }
}
