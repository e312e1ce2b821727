use super::connection::PooledConnection;
use super::driver::Dialer;
use super::query::build_delete;
use super::query::build_insert;
use super::query::build_update;
use super::query::into_record;
use super::query::Condition;
use super::query::ExecResult;
use super::query::Order;
use super::query::Row;
use super::query::Select;
use super::query::Statement;
use super::query::Value;
use crate::Result;

/// Fluent query on one table
///
/// Owns the connection it runs on; the terminal methods (`get`, `first`,
/// `insert`, `update`, `delete`) consume the builder and release it.
///
/// ```ignore
/// let rows = db
///     .table("users")
///     .await?
///     .select(["id", "name"])
///     .and_where(Condition::eq("status", 1))
///     .order_by("id", Order::Desc)
///     .limit(10)
///     .get()
///     .await?;
/// ```
pub struct QueryBuilder<D: Dialer> {
    conn: PooledConnection<D>,
    select: Select,
}

impl<D: Dialer> QueryBuilder<D> {
    pub(crate) fn new(
        conn: PooledConnection<D>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            select: Select::new(table),
        }
    }

    pub fn select<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.select.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn and_where(
        mut self,
        condition: Condition,
    ) -> Self {
        self.select.conditions.push(condition);
        self
    }

    pub fn order_by(
        mut self,
        column: impl Into<String>,
        order: Order,
    ) -> Self {
        self.select.order_by.push((column.into(), order));
        self
    }

    pub fn limit(
        mut self,
        limit: u64,
    ) -> Self {
        self.select.limit = Some(limit);
        self
    }

    pub fn offset(
        mut self,
        offset: u64,
    ) -> Self {
        self.select.offset = Some(offset);
        self
    }

    /// SELECT statement the builder currently describes
    pub fn to_statement(&self) -> Result<Statement> {
        self.select.build()
    }

    pub async fn get(mut self) -> Result<Vec<Row>> {
        let statement = self.select.build()?;
        self.conn.query_statement(&statement).await
    }

    pub async fn first(mut self) -> Result<Option<Row>> {
        self.select.limit = Some(1);
        let statement = self.select.build()?;
        Ok(self.conn.query_statement(&statement).await?.into_iter().next())
    }

    pub async fn insert<K, V>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<ExecResult>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let statement = build_insert(&self.select.table, into_record(data))?;
        self.conn.execute_statement(&statement).await
    }

    /// Updates the rows matched by the `and_where` conditions
    pub async fn update<K, V>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<ExecResult>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let statement = build_update(&self.select.table, into_record(data), &self.select.conditions)?;
        self.conn.execute_statement(&statement).await
    }

    /// Deletes the rows matched by the `and_where` conditions
    pub async fn delete(mut self) -> Result<ExecResult> {
        let statement = build_delete(&self.select.table, &self.select.conditions)?;
        self.conn.execute_statement(&statement).await
    }

    /// Gives the connection back to the caller without running anything
    pub fn into_connection(self) -> PooledConnection<D> {
        self.conn
    }
}
