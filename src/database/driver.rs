use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::query::ExecResult;
use super::query::Row;
use super::query::Statement;
use crate::Result;

/// One open database connection
///
/// Dropping a driver closes the underlying connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Driver: Send + 'static {
    async fn execute(
        &mut self,
        statement: &Statement,
    ) -> Result<ExecResult>;

    async fn query(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<Row>>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Cheap liveness check run before an idle connection is reused
    /// and before a released one is kept
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Opens new [`Driver`] connections for a pool
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Driver: Driver;

    async fn dial(&self) -> Result<Self::Driver>;
}
