//! Daemon configuration loading.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use membership_core::ProtocolConfig;
use serde::{Deserialize, Serialize};

/// Configuration for one daemon process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Failure detection and gossip settings
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Wall-clock length of one protocol tick in milliseconds (default: 1s)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a JSON file, or defaults if it does not exist.
    pub fn load(config_file: &Path) -> Result<Self> {
        let config = if config_file.exists() {
            let content = std::fs::read_to_string(config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: DaemonConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", config_file))?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            config
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_file);
            DaemonConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine or the tick timer cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.protocol
            .validate()
            .context("Invalid protocol settings")?;
        anyhow::ensure!(self.tick_interval_ms > 0, "tick_interval_ms must be positive");
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
