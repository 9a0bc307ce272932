//! Failure detection.
//!
//! Purely heartbeat-age based: no probes are sent. Each tick the detector
//! sweeps the table:
//! 1. Peers whose heartbeat advanced within `t_fail` ticks are live and gossiped
//! 2. Peers silent for `t_fail..=t_remove` ticks are suspected and kept quiet
//! 3. Peers silent for more than `t_remove` ticks are evicted

use super::table::{MemberEntry, MembershipTable, Sweep};
use crate::config::{ConfigError, ProtocolConfig};

/// Thresholds for failure detection, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDetectorConfig {
    t_fail: i64,
    t_remove: i64,
}

impl FailureDetectorConfig {
    /// Validate and build. Requires `0 < t_fail < t_remove`.
    pub fn new(t_fail: i64, t_remove: i64) -> Result<Self, ConfigError> {
        if t_fail <= 0 {
            return Err(ConfigError::NonPositiveFailTimeout(t_fail));
        }
        if t_fail >= t_remove {
            return Err(ConfigError::InvalidThresholds { t_fail, t_remove });
        }
        Ok(Self { t_fail, t_remove })
    }

    pub fn t_fail(&self) -> i64 {
        self.t_fail
    }

    pub fn t_remove(&self) -> i64 {
        self.t_remove
    }
}

impl Default for FailureDetectorConfig {
    fn default() -> Self {
        let config = ProtocolConfig::default();
        Self {
            t_fail: config.t_fail,
            t_remove: config.t_remove,
        }
    }
}

impl TryFrom<&ProtocolConfig> for FailureDetectorConfig {
    type Error = ConfigError;

    fn try_from(config: &ProtocolConfig) -> Result<Self, Self::Error> {
        Self::new(config.t_fail, config.t_remove)
    }
}

/// Heartbeat-age failure detector.
#[derive(Debug, Clone, Default)]
pub struct FailureDetector {
    config: FailureDetectorConfig,
}

impl FailureDetector {
    pub fn new(config: FailureDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FailureDetectorConfig {
        &self.config
    }

    /// Evict expired peers and return the live set for this tick.
    pub fn detect(&self, table: &mut MembershipTable, now: i64) -> Sweep {
        table.sweep(now, self.config.t_fail, self.config.t_remove)
    }

    /// Peers that are no longer gossiped but not yet evicted.
    pub fn suspected(&self, table: &MembershipTable, now: i64) -> Vec<MemberEntry> {
        table.suspected(now, self.config.t_fail, self.config.t_remove)
    }
}
