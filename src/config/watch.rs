use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_NAMESPACE;
use crate::constants::DEFAULT_WATCH_INTERVAL_SECS;
use crate::Error;
use crate::Result;

/// What the watch loop does when a tick cannot scan the store
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TickErrorPolicy {
    /// Log, keep the last known snapshot and wait for the next interval
    #[default]
    Continue,
    /// Log and end the loop with the error
    Stop,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Key prefix of every managed key
    /// Default: /micro/config
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Seconds between two scans; also the detection latency bound
    /// Default: 5
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub on_tick_error: TickErrorPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            interval_secs: default_interval_secs(),
            on_tick_error: TickErrorPolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::InvalidConfig("watch.namespace cannot be empty".into()));
        }
        if self.interval_secs == 0 {
            return Err(Error::InvalidConfig("watch.interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_interval_secs() -> u64 {
    DEFAULT_WATCH_INTERVAL_SECS
}
