use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters of the path from watcher handles to the aggregator
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatcherConfig {
    /// Capacity of the request channel shared by all watcher handles.
    ///
    /// `next()` and `stop()` wait for room when it is full; the best-effort
    /// stop sent when a watcher is dropped gives up instead.
    #[serde(default = "default_request_queue_size")]
    pub request_queue_size: usize,

    /// How many unanswered `next()` calls one watcher may have waiting.
    ///
    /// A request beyond this depth supersedes the oldest waiting one.
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            request_queue_size: default_request_queue_size(),
            max_pending_requests: default_max_pending_requests(),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_queue_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watcher.request_queue_size must be greater than 0".into(),
            )));
        }
        if self.max_pending_requests == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watcher.max_pending_requests must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_request_queue_size() -> usize {
    1024
}

fn default_max_pending_requests() -> usize {
    8
}
