//! Pooled database access
//!
//! - [`Driver`] / [`Dialer`] - the seam to a concrete database client
//! - [`ConnectionPool`] - bounded pool with `max_active` and `max_idle` caps
//! - [`PooledConnection`] - borrowed handle, returned to the pool on drop
//! - [`Database`] - facade: statement builders, transactions, query builder
//!
//! Statements use `?` placeholders. Values wrapped in [`Expression`]
//! (see [`Database::raw`]) are inlined into the SQL text instead of bound.

mod builder;
mod connection;
mod driver;
mod facade;
mod pool;
mod query;

pub use builder::*;
pub use connection::*;
pub use driver::*;
pub use facade::*;
pub use pool::*;
pub use query::*;

#[cfg(test)]
mod pool_test;
