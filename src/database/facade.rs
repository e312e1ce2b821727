use futures::future::BoxFuture;
use tracing::error;

use super::builder::QueryBuilder;
use super::connection::PooledConnection;
use super::driver::Dialer;
use super::pool::ConnectionPool;
use super::pool::PoolStats;
use super::query::build_batch_insert;
use super::query::build_delete;
use super::query::build_insert;
use super::query::build_update;
use super::query::into_record;
use super::query::Condition;
use super::query::Expression;
use super::query::Statement;
use super::query::Value;
use crate::PoolConfig;
use crate::Result;

/// Database entry point backed by a [`ConnectionPool`]
///
/// Every call borrows its own connection. Builders return the borrowed
/// handle with the statement prepared; running it and dropping the handle
/// returns the connection:
///
/// ```ignore
/// db.insert("users", [("name", Value::from("alice"))]).await?.execute().await?;
/// ```
pub struct Database<D: Dialer> {
    pool: ConnectionPool<D>,
}

impl<D: Dialer> Clone for Database<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<D: Dialer> Database<D> {
    pub fn new(
        dialer: D,
        config: PoolConfig,
    ) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(dialer, config)?,
        })
    }

    pub fn from_pool(pool: ConnectionPool<D>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool<D> {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub async fn borrow(&self) -> Result<PooledConnection<D>> {
        self.pool.borrow().await
    }

    pub async fn prepare(
        &self,
        sql: impl Into<String>,
    ) -> Result<PooledConnection<D>> {
        let mut conn = self.pool.borrow().await?;
        conn.prepare(sql);
        Ok(conn)
    }

    pub async fn insert<K, V>(
        &self,
        table: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<PooledConnection<D>>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let statement = build_insert(table, into_record(data))?;
        self.prepared(statement).await
    }

    /// One multi-row INSERT; every row must list the same columns
    pub async fn batch_insert<R, K, V>(
        &self,
        table: &str,
        rows: impl IntoIterator<Item = R>,
    ) -> Result<PooledConnection<D>>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let statement = build_batch_insert(table, rows.into_iter().map(into_record).collect())?;
        self.prepared(statement).await
    }

    pub async fn update<K, V>(
        &self,
        table: &str,
        data: impl IntoIterator<Item = (K, V)>,
        conditions: &[Condition],
    ) -> Result<PooledConnection<D>>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let statement = build_update(table, into_record(data), conditions)?;
        self.prepared(statement).await
    }

    pub async fn delete(
        &self,
        table: &str,
        conditions: &[Condition],
    ) -> Result<PooledConnection<D>> {
        let statement = build_delete(table, conditions)?;
        self.prepared(statement).await
    }

    /// Borrows a connection with a transaction already open
    ///
    /// The caller commits or rolls back; dropping it with the transaction
    /// still open closes the connection.
    pub async fn begin_transaction(&self) -> Result<PooledConnection<D>> {
        let mut conn = self.pool.borrow().await?;
        conn.begin_transaction().await?;
        Ok(conn)
    }

    /// Runs `f` inside a transaction on one borrowed connection
    ///
    /// Commits when `f` succeeds. When `f` fails the transaction is rolled
    /// back before its error is returned; a rollback failure is logged and
    /// the original error still wins. The connection is released exactly
    /// once either way.
    ///
    /// ```ignore
    /// db.transaction(|conn| Box::pin(async move {
    ///     conn.insert("orders", [("id", Value::from(1))])?.execute().await?;
    ///     conn.update("stock", [("qty", Value::from(Database::<D>::raw("qty - 1")))], &[Condition::eq("id", 7)])?
    ///         .execute()
    ///         .await?;
    ///     Ok::<_, Error>(())
    /// }))
    /// .await?;
    /// ```
    pub async fn transaction<T, F>(
        &self,
        f: F,
    ) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PooledConnection<D>) -> BoxFuture<'c, Result<T>> + Send,
    {
        let mut conn = self.begin_transaction().await?;

        match f(&mut conn).await {
            Ok(value) => {
                conn.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = conn.rollback().await {
                    error!("rollback after failed transaction also failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Query builder on `table`, holding its own connection
    pub async fn table(
        &self,
        table: impl Into<String>,
    ) -> Result<QueryBuilder<D>> {
        Ok(self.pool.borrow().await?.table(table))
    }

    /// SQL fragment inlined verbatim, e.g. `Database::raw("NOW()")`
    pub fn raw(expression: impl Into<String>) -> Expression {
        Expression::new(expression)
    }

    /// Stops handing out connections and closes the idle ones
    pub fn close(&self) {
        self.pool.close();
    }

    async fn prepared(
        &self,
        statement: Statement,
    ) -> Result<PooledConnection<D>> {
        let mut conn = self.pool.borrow().await?;
        conn.set_statement(statement);
        Ok(conn)
    }
}
