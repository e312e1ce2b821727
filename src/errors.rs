//! Configuration Sync Error Hierarchy
//!
//! Defines the error types surfaced by the sync engine, the watch loop and the
//! connection pool facade, categorized by the layer that produced them.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote key-value store failures (network, timeout, non-2xx, payload)
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Watch loop lifecycle violations
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Connection pool and driver failures
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Local configuration source could not be loaded
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Settings could not be read or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings were read but violate a validation rule
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A statement could not be built from the given table, data or conditions
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A spawned task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Store unreachable, timed out or answered with a non-2xx status
    #[error("Remote store unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },

    /// Store answered 2xx but the body could not be understood
    #[error("Malformed response from remote store: {0}")]
    Protocol(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// `listen` called while a watch loop is already running
    #[error("Watch loop is already active")]
    AlreadyActive,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Every connection is borrowed and the exhaustion policy gave up
    #[error("Connection pool exhausted ({max_active} connections active)")]
    Exhausted { max_active: usize },

    /// A new connection could not be established
    #[error("Failed to dial connection: {0}")]
    Dial(String),

    /// The driver rejected a statement or transaction command
    #[error("Driver error: {0}")]
    Driver(String),

    /// A statement was executed before anything was prepared
    #[error("No statement prepared on this connection")]
    NoStatement,

    /// Transaction command issued in the wrong transaction state
    #[error("Transaction state error: {0}")]
    TransactionState(&'static str),

    /// The pool was closed while waiting for capacity
    #[error("Connection pool is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Config source not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config source {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config source {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        let operation = if err.is_timeout() {
            "request (timeout)"
        } else if err.is_connect() {
            "connect"
        } else if err.is_decode() {
            return RemoteError::Protocol(err.to_string());
        } else {
            "request"
        };
        RemoteError::Unavailable {
            operation,
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::from(err).into()
    }
}

impl Error {
    /// True when the failure came from the remote store and a later retry may succeed.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Error::Remote(RemoteError::Unavailable { .. }))
    }
}
