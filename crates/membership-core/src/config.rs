//! Protocol configuration.
//!
//! Thresholds are expressed in protocol ticks, not wall-clock time. The host
//! decides how long a tick lasts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("t_fail must be positive, got {0}")]
    NonPositiveFailTimeout(i64),

    #[error("t_fail ({t_fail}) must be less than t_remove ({t_remove})")]
    InvalidThresholds { t_fail: i64, t_remove: i64 },

    #[error("fanout must be at least 1 when set")]
    ZeroFanout,
}

/// Settings every node receives at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Ticks without a heartbeat increase before a peer stops being gossiped
    #[serde(default = "default_t_fail")]
    pub t_fail: i64,

    /// Ticks without a heartbeat increase before a peer is evicted
    #[serde(default = "default_t_remove")]
    pub t_remove: i64,

    /// Peers to gossip to per round (None = every live peer)
    #[serde(default)]
    pub fanout: Option<usize>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            t_fail: default_t_fail(),
            t_remove: default_t_remove(),
            fanout: None,
        }
    }
}

fn default_t_fail() -> i64 {
    5
}

fn default_t_remove() -> i64 {
    20
}

impl ProtocolConfig {
    /// Check threshold ordering and fanout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.t_fail <= 0 {
            return Err(ConfigError::NonPositiveFailTimeout(self.t_fail));
        }
        if self.t_fail >= self.t_remove {
            return Err(ConfigError::InvalidThresholds {
                t_fail: self.t_fail,
                t_remove: self.t_remove,
            });
        }
        if self.fanout == Some(0) {
            return Err(ConfigError::ZeroFanout);
        }
        Ok(())
    }
}
