//! Configuration management for the sync engine and the connection pool.
//!
//! Provides hierarchical configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Optional `config/confsync` file
//! 3. File named by `CONFSYNC_CONFIG`
//! 4. Explicit override file passed by the caller
//! 5. Environment variables (highest priority)
//!

mod etcd;
mod pool;
mod watch;
pub use etcd::*;
pub use pool::*;
pub use watch::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::SETTINGS_ENV_PREFIX;
use crate::constants::SETTINGS_FILE;
use crate::constants::SETTINGS_PATH_ENV;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Remote key-value store connection parameters
    #[serde(default)]
    pub etcd: EtcdConfig,
    /// Namespace and polling behaviour of the watch loop
    #[serde(default)]
    pub watch: WatchConfig,
    /// Connection pool limits for database-style callers
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Hardcoded defaults
    /// 2. `config/confsync.{toml,json,yaml}` when present
    /// 3. The file named by `CONFSYNC_CONFIG`
    /// 4. `override_path`, when given
    /// 5. Environment variables (`CONFSYNC__WATCH__INTERVAL_SECS=10`)
    ///
    /// # Returns
    /// Merged and validated configuration
    pub fn load(override_path: Option<&str>) -> Result<Self> {
        // Defaults come from the serde attributes of each section
        let mut builder = Config::builder().add_source(File::with_name(SETTINGS_FILE).required(false));

        if let Ok(path) = env::var(SETTINGS_PATH_ENV) {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        if let Some(path) = override_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(SETTINGS_ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates every section
    /// # Errors
    /// Returns `Error::InvalidConfig` on the first violated rule
    pub fn validate(&self) -> Result<()> {
        self.etcd.validate()?;
        self.watch.validate()?;
        self.pool.validate()?;
        Ok(())
    }
}
