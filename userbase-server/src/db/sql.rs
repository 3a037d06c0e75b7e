//! Parameterized statement builder
//!
//! Assembles SQL text plus its ordered argument list from a fluent
//! description. Nothing here talks to a database; the output
//! [`Statement`] is handed to a [`Database`](super::Database) handle.
//!
//! ```
//! use userbase_server::db::sql::{Placeholder, StatementBuilder};
//!
//! let sql = StatementBuilder::new(Placeholder::Dollar);
//! let stmt = sql.delete("users").where_eq("user_id", 7_i64).build().unwrap();
//! assert_eq!(stmt.sql, "DELETE FROM users WHERE user_id = $1");
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Bind-parameter syntax used when rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `?` for every parameter
    #[default]
    Question,
    /// `$1`, `$2`, ... (Postgres)
    Dollar,
}

impl Placeholder {
    /// Render the placeholder for the 1-based parameter `position`
    fn render(self, position: usize) -> String {
        match self {
            Self::Question => "?".to_owned(),
            Self::Dollar => format!("${position}"),
        }
    }
}

/// A bound argument or a row cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
        }
    }
}

/// Rendered SQL text and its positional arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", args.join(", "))?;
        }
        Ok(())
    }
}

/// Statement could not be assembled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{statement} requires a table")]
    MissingTable { statement: &'static str },

    #[error("select requires at least one column")]
    NoColumns,

    #[error("insert requires at least one column")]
    NoInsertColumns,

    #[error("insert has {columns} columns but {values} values")]
    ColumnCountMismatch { columns: usize, values: usize },

    #[error("update requires at least one assignment")]
    NoAssignments,
}

/// Entry point for the fluent builders, configured once per process
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementBuilder {
    placeholder: Placeholder,
}

impl StatementBuilder {
    pub fn new(placeholder: Placeholder) -> Self {
        Self { placeholder }
    }

    pub fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    pub fn select<I, S>(&self, columns: I) -> SelectBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectBuilder {
            placeholder: self.placeholder,
            columns: columns.into_iter().map(Into::into).collect(),
            table: None,
            conditions: Vec::new(),
        }
    }

    pub fn insert(&self, table: impl Into<String>) -> InsertBuilder {
        InsertBuilder {
            placeholder: self.placeholder,
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            suffix: None,
        }
    }

    pub fn update(&self, table: impl Into<String>) -> UpdateBuilder {
        UpdateBuilder {
            placeholder: self.placeholder,
            table: table.into(),
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn delete(&self, table: impl Into<String>) -> DeleteBuilder {
        DeleteBuilder {
            placeholder: self.placeholder,
            table: table.into(),
            conditions: Vec::new(),
        }
    }
}

/// Tracks parameter numbering while a statement is rendered
struct Params {
    placeholder: Placeholder,
    args: Vec<Value>,
}

impl Params {
    fn new(placeholder: Placeholder) -> Self {
        Self {
            placeholder,
            args: Vec::new(),
        }
    }

    fn push(&mut self, value: Value) -> String {
        self.args.push(value);
        self.placeholder.render(self.args.len())
    }

    fn push_where(&mut self, sql: &mut String, conditions: Vec<(String, Value)>) {
        if conditions.is_empty() {
            return;
        }
        let clauses: Vec<String> = conditions
            .into_iter()
            .map(|(column, value)| format!("{column} = {}", self.push(value)))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            args: self.args,
        }
    }
}

fn require_table(table: &str, statement: &'static str) -> Result<(), BuildError> {
    if table.trim().is_empty() {
        return Err(BuildError::MissingTable { statement });
    }
    Ok(())
}

/// `SELECT <columns> FROM <table> [WHERE ...]`
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    placeholder: Placeholder,
    columns: Vec<String>,
    table: Option<String>,
    conditions: Vec<(String, Value)>,
}

impl SelectBuilder {
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Statement, BuildError> {
        if self.columns.is_empty() {
            return Err(BuildError::NoColumns);
        }
        let table = self.table.unwrap_or_default();
        require_table(&table, "select")?;

        let mut params = Params::new(self.placeholder);
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), table);
        params.push_where(&mut sql, self.conditions);
        Ok(params.finish(sql))
    }
}

/// `INSERT INTO <table> (<columns>) VALUES (...) [suffix]`
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    placeholder: Placeholder,
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    suffix: Option<String>,
}

impl InsertBuilder {
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    /// Raw text appended after the values list, e.g. `RETURNING id`
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn build(self) -> Result<Statement, BuildError> {
        require_table(&self.table, "insert")?;
        if self.columns.is_empty() {
            return Err(BuildError::NoInsertColumns);
        }
        if self.columns.len() != self.values.len() {
            return Err(BuildError::ColumnCountMismatch {
                columns: self.columns.len(),
                values: self.values.len(),
            });
        }

        let mut params = Params::new(self.placeholder);
        let slots: Vec<String> = self.values.into_iter().map(|v| params.push(v)).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            slots.join(", ")
        );
        if let Some(suffix) = self.suffix {
            sql.push(' ');
            sql.push_str(&suffix);
        }
        Ok(params.finish(sql))
    }
}

/// `UPDATE <table> SET ... [WHERE ...]`
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    placeholder: Placeholder,
    table: String,
    assignments: Vec<(String, Value)>,
    conditions: Vec<(String, Value)>,
}

impl UpdateBuilder {
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Statement, BuildError> {
        require_table(&self.table, "update")?;
        if self.assignments.is_empty() {
            return Err(BuildError::NoAssignments);
        }

        let mut params = Params::new(self.placeholder);
        let sets: Vec<String> = self
            .assignments
            .into_iter()
            .map(|(column, value)| format!("{column} = {}", params.push(value)))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, sets.join(", "));
        params.push_where(&mut sql, self.conditions);
        Ok(params.finish(sql))
    }
}

/// `DELETE FROM <table> [WHERE ...]`
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    placeholder: Placeholder,
    table: String,
    conditions: Vec<(String, Value)>,
}

impl DeleteBuilder {
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Statement, BuildError> {
        require_table(&self.table, "delete")?;

        let mut params = Params::new(self.placeholder);
        let mut sql = format!("DELETE FROM {}", self.table);
        params.push_where(&mut sql, self.conditions);
        Ok(params.finish(sql))
    }
}
