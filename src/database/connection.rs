use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tracing::warn;

use super::builder::QueryBuilder;
use super::driver::Dialer;
use super::driver::Driver;
use super::pool::PoolInner;
use super::query::build_batch_insert;
use super::query::build_delete;
use super::query::build_insert;
use super::query::build_update;
use super::query::into_record;
use super::query::Condition;
use super::query::ExecResult;
use super::query::Row;
use super::query::Statement;
use super::query::Value;
use crate::PoolError;
use crate::Result;

/// A borrowed connection, returned to its pool when dropped
///
/// Holds at most one prepared [`Statement`]. Builders replace it, `execute`
/// and the query methods run it and keep it for re-execution.
///
/// A handle dropped while a transaction is open, or after
/// [`mark_broken`](Self::mark_broken), is closed instead of being reused.
pub struct PooledConnection<D: Dialer> {
    pool: Arc<PoolInner<D>>,
    driver: Option<D::Driver>,
    permit: Option<OwnedSemaphorePermit>,
    statement: Option<Statement>,
    in_transaction: bool,
    broken: bool,
}

impl<D: Dialer> PooledConnection<D> {
    pub(crate) fn new(
        pool: Arc<PoolInner<D>>,
        driver: D::Driver,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            pool,
            driver: Some(driver),
            permit: Some(permit),
            statement: None,
            in_transaction: false,
            broken: false,
        }
    }

    /// Sets raw SQL as the prepared statement, with no values bound yet
    pub fn prepare(
        &mut self,
        sql: impl Into<String>,
    ) -> &mut Self {
        self.statement = Some(Statement {
            sql: sql.into(),
            params: Vec::new(),
        });
        self
    }

    /// Binds `params` to the placeholders of the prepared SQL, replacing any
    /// earlier binding. Raw expressions are inlined.
    pub fn bind(
        &mut self,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<&mut Self> {
        let sql = self.statement.take().ok_or(PoolError::NoStatement)?.sql;
        self.statement = Some(Statement::new(sql, params.into_iter().collect())?);
        Ok(self)
    }

    pub fn insert<K, V>(
        &mut self,
        table: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<&mut Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.statement = Some(build_insert(table, into_record(data))?);
        Ok(self)
    }

    pub fn batch_insert<R, K, V>(
        &mut self,
        table: &str,
        rows: impl IntoIterator<Item = R>,
    ) -> Result<&mut Self>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let rows = rows.into_iter().map(into_record).collect();
        self.statement = Some(build_batch_insert(table, rows)?);
        Ok(self)
    }

    pub fn update<K, V>(
        &mut self,
        table: &str,
        data: impl IntoIterator<Item = (K, V)>,
        conditions: &[Condition],
    ) -> Result<&mut Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.statement = Some(build_update(table, into_record(data), conditions)?);
        Ok(self)
    }

    pub fn delete(
        &mut self,
        table: &str,
        conditions: &[Condition],
    ) -> Result<&mut Self> {
        self.statement = Some(build_delete(table, conditions)?);
        Ok(self)
    }

    pub fn statement(&self) -> Option<&Statement> {
        self.statement.as_ref()
    }

    pub(crate) fn set_statement(
        &mut self,
        statement: Statement,
    ) {
        self.statement = Some(statement);
    }

    /// Runs the prepared statement as a write
    pub async fn execute(&mut self) -> Result<ExecResult> {
        let statement = self.statement.clone().ok_or(PoolError::NoStatement)?;
        self.execute_statement(&statement).await
    }

    /// Runs the prepared statement and returns every row
    pub async fn query_all(&mut self) -> Result<Vec<Row>> {
        let statement = self.statement.clone().ok_or(PoolError::NoStatement)?;
        self.query_statement(&statement).await
    }

    /// Runs the prepared statement and returns its first row
    pub async fn query_one(&mut self) -> Result<Option<Row>> {
        Ok(self.query_all().await?.into_iter().next())
    }

    pub(crate) async fn execute_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<ExecResult> {
        self.driver_mut()?.execute(statement).await
    }

    pub(crate) async fn query_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<Row>> {
        self.driver_mut()?.query(statement).await
    }

    pub async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(PoolError::TransactionState("transaction already started").into());
        }
        self.driver_mut()?.begin().await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commits the open transaction
    ///
    /// A failed commit leaves the transaction open, so the handle is closed on release.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(PoolError::TransactionState("no transaction in progress").into());
        }
        self.driver_mut()?.commit().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Rolls back the open transaction; a failed rollback marks the handle broken
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(PoolError::TransactionState("no transaction in progress").into());
        }
        if let Err(e) = self.driver_mut()?.rollback().await {
            self.broken = true;
            return Err(e);
        }
        self.in_transaction = false;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Closes the connection on release instead of parking it
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Query builder on `table` that owns this connection
    pub fn table(
        self,
        table: impl Into<String>,
    ) -> QueryBuilder<D> {
        QueryBuilder::new(self, table)
    }

    /// Returns the connection to the pool now
    pub fn release(self) {}

    fn driver_mut(&mut self) -> Result<&mut D::Driver> {
        self.driver.as_mut().ok_or_else(|| PoolError::Closed.into())
    }
}

impl<D: Dialer> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        if self.in_transaction {
            warn!("connection released with an open transaction, closing it");
        }
        let reusable = !self.broken && !self.in_transaction;
        self.pool.give_back(driver, reusable);

        // Park first, then free the slot, so a waiting borrow finds the idle connection
        drop(self.permit.take());
        self.pool.report();
    }
}
