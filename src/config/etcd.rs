use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ETCD_URL;
use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::Error;
use crate::Result;

/// Connection parameters of the remote key-value store
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EtcdConfig {
    /// Base url of the etcd v3 JSON gateway
    /// Default: http://127.0.0.1:2379/v3
    #[serde(default = "default_url")]
    pub url: String,

    /// User for the authentication handshake. Empty disables authentication.
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Timeout of a single gateway request
    /// Default: 5 seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EtcdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidConfig("etcd.url cannot be empty".into()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "etcd.url must be an http(s) url, got {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidConfig("etcd.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn requires_auth(&self) -> bool {
        !self.user.is_empty()
    }
}

fn default_url() -> String {
    DEFAULT_ETCD_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
