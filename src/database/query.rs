use std::collections::BTreeMap;
use std::fmt;

use crate::Error;
use crate::Result;

/// Database-native SQL fragment, inlined verbatim instead of being bound
///
/// Use it for function calls such as `NOW()` or `counter + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression(String);

impl Expression {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameter value of a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Inlined into the SQL text, never bound
    Raw(Expression),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl From<Expression> for Value {
    fn from(v: Expression) -> Self {
        Value::Raw(v)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row, column name to value
pub type Row = BTreeMap<String, Value>;

/// Outcome of a write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// SQL text with `?` placeholders and the values bound to them
///
/// Never contains [`Value::Raw`]: raw values are inlined when the statement is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Pairs `sql` with `params`, inlining raw expressions into their placeholder
    ///
    /// Placeholders inside single-quoted literals are ignored.
    pub fn new(
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Self> {
        let sql = sql.into();
        let mut out = String::with_capacity(sql.len());
        let mut bound = Vec::with_capacity(params.len());
        let mut params = params.into_iter();
        let mut in_literal = false;

        for c in sql.chars() {
            match c {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(c);
                }
                '?' if !in_literal => match params.next() {
                    Some(Value::Raw(expr)) => out.push_str(expr.as_str()),
                    Some(value) => {
                        out.push('?');
                        bound.push(value);
                    }
                    None => {
                        return Err(Error::InvalidStatement(format!(
                            "more placeholders than parameters in: {}",
                            sql
                        )))
                    }
                },
                _ => out.push(c),
            }
        }

        if params.next().is_some() {
            return Err(Error::InvalidStatement(format!(
                "more parameters than placeholders in: {}",
                sql
            )));
        }

        Ok(Self { sql: out, params: bound })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl Operator {
    fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

/// `column <op> value`, joined with AND when several are given
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(column, Operator::Eq, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Quotes an identifier, segment by segment for `table.column`
pub(crate) fn quote_ident(ident: &str) -> String {
    if ident == "*" {
        return ident.to_string();
    }
    ident
        .split('.')
        .map(|part| {
            if part == "*" {
                part.to_string()
            } else {
                format!("`{}`", part.replace('`', "``"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn push_where(
    sql: &mut String,
    params: &mut Vec<Value>,
    conditions: &[Condition],
) {
    if conditions.is_empty() {
        return;
    }
    let clauses: Vec<String> = conditions
        .iter()
        .map(|c| match (&c.value, c.op) {
            (Value::Null, Operator::Eq) => format!("{} IS NULL", quote_ident(&c.column)),
            (Value::Null, Operator::Ne) => format!("{} IS NOT NULL", quote_ident(&c.column)),
            (value, op) => {
                params.push(value.clone());
                format!("{} {} ?", quote_ident(&c.column), op.as_sql())
            }
        })
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
}

pub(crate) fn into_record<K, V>(data: impl IntoIterator<Item = (K, V)>) -> Vec<(String, Value)>
where
    K: Into<String>,
    V: Into<Value>,
{
    data.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

pub(crate) fn build_insert(
    table: &str,
    data: Vec<(String, Value)>,
) -> Result<Statement> {
    build_batch_insert(table, vec![data])
}

/// One multi-row INSERT; every row must list the same columns in the same order
pub(crate) fn build_batch_insert(
    table: &str,
    rows: Vec<Vec<(String, Value)>>,
) -> Result<Statement> {
    let first = rows
        .first()
        .filter(|row| !row.is_empty())
        .ok_or_else(|| Error::InvalidStatement(format!("insert into {} without data", table)))?;
    let columns: Vec<String> = first.iter().map(|(column, _)| column.clone()).collect();

    let mut params = Vec::with_capacity(columns.len() * rows.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let row_columns: Vec<&String> = row.iter().map(|(column, _)| column).collect();
        if row_columns.len() != columns.len() || row_columns.iter().zip(&columns).any(|(a, b)| *a != b) {
            return Err(Error::InvalidStatement(format!(
                "batch insert into {} has rows with different columns",
                table
            )));
        }
        tuples.push(format!("({})", vec!["?"; columns.len()].join(", ")));
        params.extend(row.into_iter().map(|(_, value)| value));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        tuples.join(", ")
    );
    Statement::new(sql, params)
}

/// UPDATE with a mandatory WHERE clause
pub(crate) fn build_update(
    table: &str,
    data: Vec<(String, Value)>,
    conditions: &[Condition],
) -> Result<Statement> {
    if data.is_empty() {
        return Err(Error::InvalidStatement(format!("update of {} without data", table)));
    }
    if conditions.is_empty() {
        return Err(Error::InvalidStatement(format!("update of {} without conditions", table)));
    }

    let mut params = Vec::with_capacity(data.len() + conditions.len());
    let assignments: Vec<String> = data
        .into_iter()
        .map(|(column, value)| {
            params.push(value);
            format!("{} = ?", quote_ident(&column))
        })
        .collect();

    let mut sql = format!("UPDATE {} SET {}", quote_ident(table), assignments.join(", "));
    push_where(&mut sql, &mut params, conditions);
    Statement::new(sql, params)
}

/// DELETE with a mandatory WHERE clause
pub(crate) fn build_delete(
    table: &str,
    conditions: &[Condition],
) -> Result<Statement> {
    if conditions.is_empty() {
        return Err(Error::InvalidStatement(format!("delete from {} without conditions", table)));
    }
    let mut params = Vec::with_capacity(conditions.len());
    let mut sql = format!("DELETE FROM {}", quote_ident(table));
    push_where(&mut sql, &mut params, conditions);
    Statement::new(sql, params)
}

/// SELECT description built by [`crate::QueryBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) order_by: Vec<(String, Order)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl Select {
    pub(crate) fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub(crate) fn build(&self) -> Result<Statement> {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
        };

        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", columns, quote_ident(&self.table));
        push_where(&mut sql, &mut params, &self.conditions);

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, order)| {
                    let direction = match order {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    format!("{} {}", quote_ident(column), direction)
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Statement::new(sql, params)
    }
}
