use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_POOL_MAX_ACTIVE;
use crate::constants::DEFAULT_POOL_MAX_IDLE;
use crate::Error;
use crate::Result;

/// Behaviour of `borrow` once `max_active` connections are out
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Wait for a release, bounded by `wait_timeout_ms` when non-zero
    #[default]
    Wait,
    /// Return `PoolError::Exhausted` immediately
    Fail,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoolConfig {
    /// Soft cap on cached idle connections
    /// Default: 5
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Hard cap on concurrently borrowed connections
    /// Default: 5
    #[serde(default = "default_max_active")]
    pub max_active: usize,

    #[serde(default)]
    pub exhausted_policy: ExhaustedPolicy,

    /// Upper bound of a waiting borrow, 0 waits forever
    #[serde(default)]
    pub wait_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: default_max_idle(),
            max_active: default_max_active(),
            exhausted_policy: ExhaustedPolicy::default(),
            wait_timeout_ms: 0,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_active == 0 {
            return Err(Error::InvalidConfig("pool.max_active must be at least 1".into()));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        match self.wait_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn default_max_idle() -> usize {
    DEFAULT_POOL_MAX_IDLE
}
fn default_max_active() -> usize {
    DEFAULT_POOL_MAX_ACTIVE
}
