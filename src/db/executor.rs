//! SQL execution boundary.
//!
//! The engine talks to the database through [`SqlExecutor`], a three-call
//! capability set: execute a statement, run a query for rows, list existing
//! tables. Statements carry their values as bound parameters; identifiers
//! are validated and backtick-quoted by the builder.

use std::collections::BTreeMap;
use std::fmt;

use sqlx::mysql::MySqlPool;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::{MigrateError, Result};

/// A value bound into a statement or decoded out of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl SqlValue {
    pub fn opt_text(value: Option<&str>) -> Self {
        match value {
            Some(v) => SqlValue::Text(v.to_string()),
            None => SqlValue::Null,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Null => write!(f, "NULL"),
        }
    }
}

/// Validate that a name is usable as a SQL identifier: letters, digits,
/// underscores and dollar signs, starting with a letter or underscore.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn checked_ident(name: &str) -> Result<String> {
    if !is_valid_identifier(name) {
        return Err(MigrateError::Identifier(name.to_string()));
    }
    Ok(format!("`{}`", name))
}

/// One parameterized SQL statement: text with `?` placeholders plus the
/// values to bind, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// A statement with no bound values (DDL, `SHOW` commands).
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn insert(table: &str, values: &[(&str, SqlValue)]) -> Result<Self> {
        let columns = values
            .iter()
            .map(|(name, _)| checked_ident(name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let placeholders = vec!["?"; values.len()].join(", ");
        Ok(Self {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                checked_ident(table)?,
                columns,
                placeholders
            ),
            params: values.iter().map(|(_, v)| v.clone()).collect(),
        })
    }

    pub fn update(
        table: &str,
        sets: &[(&str, SqlValue)],
        conds: &[(&str, SqlValue)],
    ) -> Result<Self> {
        let assignments = sets
            .iter()
            .map(|(name, _)| Ok(format!("{} = ?", checked_ident(name)?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let mut sql = format!("UPDATE {} SET {}", checked_ident(table)?, assignments);
        let mut params: Vec<SqlValue> = sets.iter().map(|(_, v)| v.clone()).collect();
        Self::push_where(&mut sql, &mut params, conds)?;
        Ok(Self { sql, params })
    }

    pub fn delete(table: &str, conds: &[(&str, SqlValue)]) -> Result<Self> {
        let mut sql = format!("DELETE FROM {}", checked_ident(table)?);
        let mut params = Vec::new();
        Self::push_where(&mut sql, &mut params, conds)?;
        Ok(Self { sql, params })
    }

    pub fn select(table: &str, columns: &[&str], conds: &[(&str, SqlValue)]) -> Result<Self> {
        let cols = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| checked_ident(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", cols, checked_ident(table)?);
        let mut params = Vec::new();
        Self::push_where(&mut sql, &mut params, conds)?;
        Ok(Self { sql, params })
    }

    fn push_where(
        sql: &mut String,
        params: &mut Vec<SqlValue>,
        conds: &[(&str, SqlValue)],
    ) -> Result<()> {
        if conds.is_empty() {
            return Ok(());
        }
        let clauses = conds
            .iter()
            .map(|(name, _)| Ok(format!("{} = ?", checked_ident(name)?)))
            .collect::<Result<Vec<_>>>()?
            .join(" AND ");
        sql.push_str(" WHERE ");
        sql.push_str(&clauses);
        params.extend(conds.iter().map(|(_, v)| v.clone()));
        Ok(())
    }
}

/// One decoded result row: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, SqlValue)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    /// First column value, for single-column results like `SHOW TABLES`.
    pub fn first(&self) -> Option<&SqlValue> {
        self.values.values().next()
    }

    pub fn i64(&self, column: &str) -> Result<i64> {
        match self.get(column) {
            Some(SqlValue::Int(v)) => Ok(*v),
            Some(SqlValue::Bool(v)) => Ok(i64::from(*v)),
            other => Err(MigrateError::LogFormat(format!(
                "column '{}' is not an integer (got {:?})",
                column, other
            ))),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        match self.get(column) {
            Some(SqlValue::Text(v)) => Ok(v.clone()),
            other => Err(MigrateError::LogFormat(format!(
                "column '{}' is not text (got {:?})",
                column, other
            ))),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.get(column) {
            Some(SqlValue::Text(v)) => Ok(Some(v.clone())),
            Some(SqlValue::Null) | None => Ok(None),
            other => Err(MigrateError::LogFormat(format!(
                "column '{}' is not text (got {:?})",
                column, other
            ))),
        }
    }

    /// Boolean stored the MySQL way: TINYINT zero/non-zero.
    pub fn bool(&self, column: &str) -> Result<bool> {
        match self.get(column) {
            Some(SqlValue::Bool(v)) => Ok(*v),
            Some(SqlValue::Int(v)) => Ok(*v != 0),
            other => Err(MigrateError::LogFormat(format!(
                "column '{}' is not a boolean (got {:?})",
                column, other
            ))),
        }
    }
}

/// Capability set the engine requires from the database.
///
/// Implementations execute statements sequentially and synchronously from
/// the engine's point of view; there is one writer at a time.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    async fn execute(&self, stmt: &Statement) -> Result<()>;
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>>;
    async fn list_tables(&self) -> Result<Vec<String>>;
}

/// [`SqlExecutor`] backed by a sqlx MySQL pool.
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn bind<'q>(
        stmt: &'q Statement,
    ) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
        let mut query = sqlx::query(&stmt.sql);
        for param in &stmt.params {
            query = match param {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.clone()),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query
    }

    fn decode_row(row: &sqlx::mysql::MySqlRow) -> Result<Row> {
        let mut pairs = Vec::with_capacity(row.columns().len());
        for (idx, column) in row.columns().iter().enumerate() {
            let raw = row.try_get_raw(idx)?;
            let value = if raw.is_null() {
                SqlValue::Null
            } else {
                match column.type_info().name() {
                    "BOOLEAN" => SqlValue::Bool(row.try_get(idx)?),
                    "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                        SqlValue::Int(row.try_get::<i64, _>(idx)?)
                    }
                    "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED"
                    | "INT UNSIGNED" | "BIGINT UNSIGNED" => {
                        SqlValue::Int(row.try_get::<u64, _>(idx)? as i64)
                    }
                    _ => SqlValue::Text(row.try_get::<String, _>(idx)?),
                }
            };
            pairs.push((column.name().to_string(), value));
        }
        Ok(Row::from_pairs(pairs))
    }
}

impl SqlExecutor for MySqlExecutor {
    async fn execute(&self, stmt: &Statement) -> Result<()> {
        debug!(sql = %stmt.sql, "executing");
        Self::bind(stmt).execute(&self.pool).await?;
        Ok(())
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        debug!(sql = %stmt.sql, "querying");
        let rows = Self::bind(stmt).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self.query(&Statement::raw("SHOW TABLES")).await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            match row.first() {
                Some(SqlValue::Text(name)) => tables.push(name.clone()),
                other => {
                    return Err(MigrateError::LogFormat(format!(
                        "unexpected SHOW TABLES value: {:?}",
                        other
                    )));
                }
            }
        }
        Ok(tables)
    }
}
