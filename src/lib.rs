//! # confsync
//!
//! Keeps one namespace of an etcd-style key-value store in step with local
//! configuration files, and tells listeners what changed.
//!
//! - [`Configurator`] - watch loop (`listen`), one-shot push (`sync`), `get`, `all`, `close`
//! - [`diff`] - puts and deletes between two snapshots
//! - [`KvStore`] / [`EtcdClient`] / [`MemoryStore`] - the remote store seam
//! - [`Database`] / [`ConnectionPool`] - bounded connection pool facade
//! - [`Settings`] - layered configuration for all of the above
//!
//! ## Watching a namespace
//! ```no_run
//! use confsync::{Configurator, EtcdClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> confsync::Result<()> {
//!     let configurator = Configurator::<EtcdClient>::connect(&Settings::load(None)?).await?;
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     configurator.listen(tx).await?;
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod constants;
mod database;
mod errors;
mod sync;

pub mod metrics;

pub use client::*;
pub use config::*;
pub use constants::DEFAULT_NAMESPACE;
pub use database::*;
pub use errors::*;
pub use sync::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
