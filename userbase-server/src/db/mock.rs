//! In-memory test double for the database layer
//!
//! [`MockDatabase`] does not simulate tables. A test registers the
//! statements it expects, in order, together with canned rows, affected
//! counts or errors. Every call consumes the head of the queue; a call
//! that does not match it fails with a query error and leaves the
//! expectation in place. At teardown `expectations_were_met` reports
//! anything left over.
//!
//! ```
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use userbase_server::db::mock::{Expectation, MockDatabase};
//! use userbase_server::db::sql::{Placeholder, StatementBuilder};
//! use userbase_server::db::Database;
//!
//! let db = MockDatabase::new();
//! db.expect(Expectation::exec(r"DELETE FROM users").with_values([5_i64]).returning_affected(1));
//!
//! let stmt = StatementBuilder::new(Placeholder::Dollar)
//!     .delete("users")
//!     .where_eq("user_id", 5_i64)
//!     .build()
//!     .unwrap();
//! assert_eq!(db.execute(&stmt).await.unwrap(), 1);
//! db.expectations_were_met().unwrap();
//! # });
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use super::sql::{Statement, Value};
use super::{Connector, ConnectorStep, Database, Row};
use crate::error::{DbError, DbResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How an expectation recognises SQL text
#[derive(Debug, Clone)]
pub enum SqlMatcher {
    /// Regular expression searched anywhere in the statement
    Regex(String),
    /// Whole statement must be identical
    Exact(String),
}

impl SqlMatcher {
    fn check(&self, sql: &str) -> Result<(), String> {
        match self {
            Self::Regex(pattern) => {
                let re = Regex::new(pattern)
                    .map_err(|e| format!("could not compile pattern '{pattern}': {e}"))?;
                if re.is_match(sql) {
                    Ok(())
                } else {
                    Err(format!("'{sql}' does not match pattern '{pattern}'"))
                }
            }
            Self::Exact(expected) => {
                if expected == sql {
                    Ok(())
                } else {
                    Err(format!("'{sql}' is not equal to '{expected}'"))
                }
            }
        }
    }
}

impl fmt::Display for SqlMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(p) => write!(f, "matching '{p}'"),
            Self::Exact(s) => write!(f, "equal to '{s}'"),
        }
    }
}

/// Matcher for one bound argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgMatcher {
    Any,
    Eq(Value),
}

impl ArgMatcher {
    pub fn exact(value: impl Into<Value>) -> Self {
        Self::Eq(value.into())
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Eq(expected) => expected == value,
        }
    }
}

impl fmt::Display for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("<any>"),
            Self::Eq(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Query,
    Exec,
    Ping,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Exec => "exec",
            Self::Ping => "ping",
        })
    }
}

#[derive(Debug)]
enum Outcome {
    Rows(Vec<Row>),
    Affected(u64),
    Done,
    Error(DbError),
}

/// One registered statement and its canned response
#[derive(Debug)]
pub struct Expectation {
    kind: Kind,
    sql: Option<SqlMatcher>,
    args: Option<Vec<ArgMatcher>>,
    outcome: Outcome,
}

impl Expectation {
    fn new(kind: Kind, sql: Option<SqlMatcher>, outcome: Outcome) -> Self {
        Self {
            kind,
            sql,
            args: None,
            outcome,
        }
    }

    /// Row-returning statement whose SQL matches `pattern` (regex)
    pub fn query(pattern: impl Into<String>) -> Self {
        Self::new(
            Kind::Query,
            Some(SqlMatcher::Regex(pattern.into())),
            Outcome::Rows(Vec::new()),
        )
    }

    /// Row-returning statement with exactly this SQL
    pub fn query_exact(sql: impl Into<String>) -> Self {
        Self::new(
            Kind::Query,
            Some(SqlMatcher::Exact(sql.into())),
            Outcome::Rows(Vec::new()),
        )
    }

    /// Statement run for its side effect whose SQL matches `pattern` (regex)
    pub fn exec(pattern: impl Into<String>) -> Self {
        Self::new(
            Kind::Exec,
            Some(SqlMatcher::Regex(pattern.into())),
            Outcome::Affected(0),
        )
    }

    /// Statement run for its side effect with exactly this SQL
    pub fn exec_exact(sql: impl Into<String>) -> Self {
        Self::new(
            Kind::Exec,
            Some(SqlMatcher::Exact(sql.into())),
            Outcome::Affected(0),
        )
    }

    /// Liveness check; only consulted when ping monitoring is on
    pub fn ping() -> Self {
        Self::new(Kind::Ping, None, Outcome::Done)
    }

    /// Require the bound arguments to match, position by position
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = ArgMatcher>,
    {
        self.args = Some(args.into_iter().collect());
        self
    }

    /// Require the bound arguments to equal these values
    pub fn with_values<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_args(values.into_iter().map(ArgMatcher::exact))
    }

    pub fn returning_rows(mut self, rows: Vec<Row>) -> Self {
        self.outcome = Outcome::Rows(rows);
        self
    }

    pub fn returning_affected(mut self, rows_affected: u64) -> Self {
        self.outcome = Outcome::Affected(rows_affected);
        self
    }

    pub fn returning_error(mut self, err: DbError) -> Self {
        self.outcome = Outcome::Error(err);
        self
    }

    fn check(&self, kind: Kind, stmt: Option<&Statement>) -> Result<(), String> {
        if self.kind != kind {
            return Err(format!("next expectation is {self}"));
        }
        let Some(stmt) = stmt else {
            return Ok(());
        };
        if let Some(matcher) = &self.sql {
            matcher.check(&stmt.sql)?;
        }
        if let Some(args) = &self.args {
            if args.len() != stmt.args.len() {
                return Err(format!(
                    "expected {} arguments, got {}",
                    args.len(),
                    stmt.args.len()
                ));
            }
            for (position, (matcher, value)) in args.iter().zip(&stmt.args).enumerate() {
                if !matcher.matches(value) {
                    return Err(format!(
                        "argument {} is {value}, expected {matcher}",
                        position + 1
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(sql) = &self.sql {
            write!(f, " {sql}")?;
        }
        if let Some(args) = &self.args {
            let args: Vec<String> = args.iter().map(ToString::to_string).collect();
            write!(f, " with args [{}]", args.join(", "))?;
        }
        Ok(())
    }
}

/// Teardown failure
#[derive(Debug, Error)]
pub enum MockError {
    #[error("there are unfulfilled expectations: {}", .0.join("; "))]
    Unfulfilled(Vec<String>),
}

#[derive(Debug, Default)]
struct MockInner {
    expectations: Mutex<VecDeque<Expectation>>,
    monitor_pings: bool,
    closed: AtomicBool,
}

/// Expectation-driven database handle
///
/// Clones share the same queue, so a test can keep one copy while the
/// orchestrator and handlers use another.
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    inner: Arc<MockInner>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pings must be registered with [`Expectation::ping`] and are
    /// consumed in order like any other call.
    pub fn with_ping_monitoring() -> Self {
        Self {
            inner: Arc::new(MockInner {
                monitor_pings: true,
                ..MockInner::default()
            }),
        }
    }

    /// Register the next expected call
    pub fn expect(&self, expectation: Expectation) -> &Self {
        lock(&self.inner.expectations).push_back(expectation);
        self
    }

    /// Number of registered calls not yet consumed
    pub fn pending(&self) -> usize {
        lock(&self.inner.expectations).len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Fails if any registered call was never made
    pub fn expectations_were_met(&self) -> Result<(), MockError> {
        let queue = lock(&self.inner.expectations);
        if queue.is_empty() {
            Ok(())
        } else {
            Err(MockError::Unfulfilled(
                queue.iter().map(ToString::to_string).collect(),
            ))
        }
    }

    fn consume(&self, kind: Kind, stmt: Option<&Statement>) -> DbResult<Outcome> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }

        let call = match stmt {
            Some(stmt) => format!("{kind} '{stmt}'"),
            None => kind.to_string(),
        };

        let mut queue = lock(&self.inner.expectations);
        let Some(next) = queue.front() else {
            tracing::debug!(%call, "unexpected call on mock database");
            return Err(DbError::query(format!(
                "all expectations were already fulfilled, call to {call} was not expected"
            )));
        };

        if let Err(reason) = next.check(kind, stmt) {
            tracing::debug!(%call, %reason, "mock expectation mismatch");
            return Err(DbError::query(format!(
                "call to {call} was not expected: {reason}"
            )));
        }

        let consumed = queue.pop_front().map(|e| e.outcome);
        consumed.ok_or_else(|| DbError::query("expectation queue drained concurrently"))
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn fetch_all(&self, stmt: &Statement) -> DbResult<Vec<Row>> {
        match self.consume(Kind::Query, Some(stmt))? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) | Outcome::Done => Ok(Vec::new()),
            Outcome::Error(err) => Err(err),
        }
    }

    async fn fetch_optional(&self, stmt: &Statement) -> DbResult<Option<Row>> {
        Ok(self.fetch_all(stmt).await?.into_iter().next())
    }

    async fn execute(&self, stmt: &Statement) -> DbResult<u64> {
        match self.consume(Kind::Exec, Some(stmt))? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows(rows) => Ok(rows.len() as u64),
            Outcome::Done => Ok(0),
            Outcome::Error(err) => Err(err),
        }
    }

    async fn ping(&self) -> DbResult<()> {
        if !self.inner.monitor_pings {
            return if self.is_closed() {
                Err(DbError::Closed)
            } else {
                Ok(())
            };
        }
        match self.consume(Kind::Ping, None)? {
            Outcome::Error(err) => Err(err),
            _ => Ok(()),
        }
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that hands out a shared [`MockDatabase`].
///
/// `migrate_up`/`migrate_down` do nothing: the double has no schema.
/// A failure can be injected at any step, and every call is recorded so
/// tests can assert the order the orchestrator used.
#[derive(Debug, Default)]
pub struct MockConnector {
    db: MockDatabase,
    failures: Mutex<HashMap<ConnectorStep, DbError>>,
    calls: Mutex<Vec<ConnectorStep>>,
    connection_string: Mutex<Option<String>>,
}

impl MockConnector {
    pub fn new(db: MockDatabase) -> Self {
        Self {
            db,
            ..Self::default()
        }
    }

    /// Make `step` fail with `err` the next time it runs
    pub fn fail_at(self, step: ConnectorStep, err: DbError) -> Self {
        lock(&self.failures).insert(step, err);
        self
    }

    pub fn database(&self) -> &MockDatabase {
        &self.db
    }

    /// Steps invoked so far, in call order
    pub fn calls(&self) -> Vec<ConnectorStep> {
        lock(&self.calls).clone()
    }

    /// Connection string passed to the last `open`
    pub fn connection_string(&self) -> Option<String> {
        lock(&self.connection_string).clone()
    }

    fn enter(&self, step: ConnectorStep) -> DbResult<()> {
        lock(&self.calls).push(step);
        match lock(&self.failures).remove(&step) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Handle = MockDatabase;

    async fn open(&self, connection_string: &str) -> DbResult<MockDatabase> {
        self.enter(ConnectorStep::Open)?;
        *lock(&self.connection_string) = Some(connection_string.to_owned());
        Ok(self.db.clone())
    }

    async fn ping(&self, handle: &MockDatabase) -> DbResult<()> {
        self.enter(ConnectorStep::Ping)?;
        handle.ping().await
    }

    async fn migrate_down(&self, _handle: &MockDatabase) -> DbResult<()> {
        self.enter(ConnectorStep::MigrateDown)
    }

    async fn migrate_up(&self, _handle: &MockDatabase) -> DbResult<()> {
        self.enter(ConnectorStep::MigrateUp)
    }
}
