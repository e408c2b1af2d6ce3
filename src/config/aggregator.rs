use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters of the aggregator loop
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AggregatorConfig {
    /// Publish store and watcher gauges to the metrics registry
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,

    /// Backing changes applied back to back before one queued watcher
    /// request is let in.
    ///
    /// Changes normally take priority over requests; this bounds how long a
    /// busy backing can hold watchers off.
    #[serde(default = "default_max_consecutive_changes")]
    pub max_consecutive_changes: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_enable_metrics(),
            max_consecutive_changes: default_max_consecutive_changes(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_changes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "aggregator.max_consecutive_changes must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_enable_metrics() -> bool {
    true
}

fn default_max_consecutive_changes() -> usize {
    128
}
