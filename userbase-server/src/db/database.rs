//! Connection handle abstraction
//!
//! Everything above the connector layer runs statements through
//! `Arc<dyn Database>`, so handlers never know whether they talk to
//! Postgres or to the test double.

use async_trait::async_trait;

use super::sql::{Statement, Value};
use crate::error::{DbError, DbResult};

/// One result row, cells in select-list order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> DbResult<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| DbError::decode(index, format!("row has {} columns", self.values.len())))
    }

    /// Read an integer cell
    pub fn get_i64(&self, index: usize) -> DbResult<i64> {
        match self.get(index)? {
            Value::Int(v) => Ok(*v),
            other => Err(DbError::decode(index, format!("expected integer, got {other}"))),
        }
    }

    /// Read a text cell
    pub fn get_str(&self, index: usize) -> DbResult<&str> {
        match self.get(index)? {
            Value::Text(v) => Ok(v),
            other => Err(DbError::decode(index, format!("expected text, got {other}"))),
        }
    }
}

impl<V: Into<Value>> FromIterator<V> for Row {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// An open database session (or pool of sessions)
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a row-returning statement and collect every row
    async fn fetch_all(&self, stmt: &Statement) -> DbResult<Vec<Row>>;

    /// Run a row-returning statement and keep the first row, if any
    async fn fetch_optional(&self, stmt: &Statement) -> DbResult<Option<Row>>;

    /// Run a statement that must return a row
    async fn fetch_one(&self, stmt: &Statement) -> DbResult<Row> {
        self.fetch_optional(stmt).await?.ok_or(DbError::RowNotFound)
    }

    /// Run a statement and return the number of rows affected
    async fn execute(&self, stmt: &Statement) -> DbResult<u64>;

    /// Verify the backend is reachable
    async fn ping(&self) -> DbResult<()>;

    /// Release the underlying session(s)
    async fn close(&self);
}
