//! Client module for the remote key-value store
//!
//! Provides the seam the sync engine talks through:
//! - [`KvStore`] - point lookups, prefix scans, put, delete, authentication
//! - [`EtcdClient`] - etcd v3 JSON gateway implementation over HTTP
//! - [`MemoryStore`] - in-process implementation for tests and dry runs
//!
//! # Basic Usage
//! ```no_run
//! use confsync::{EtcdClient, EtcdConfig, KvStore};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = EtcdClient::connect(&EtcdConfig::default()).await.unwrap();
//!
//!     client.put("/micro/config/db/host", "10.0.0.1").await.unwrap();
//!     let all = client.get_keys_with_prefix("/micro/config").await.unwrap();
//!
//!     println!("Config: {:?}", all);
//! }
//! ```

mod etcd;
mod memory;

pub use etcd::*;
pub use memory::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;
use crate::Snapshot;

/// Authenticated session returned by the store handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
}

/// Remote key-value store consumed by the sync engine
///
/// Every call is one request/response round trip. Failures surface as
/// [`crate::RemoteError`] and are never retried here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Returns the value of `key`, `None` when absent
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>>;

    /// Returns every key starting with `prefix` together with its value
    async fn get_keys_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Snapshot>;

    async fn put(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()>;

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Opens an authenticated session; later calls carry its token
    async fn authenticate(
        &self,
        user: &str,
        password: &str,
    ) -> Result<Session>;
}
