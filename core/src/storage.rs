//! The storage collaborator boundary.
//!
//! Statements go out as SQL text with positional `?` markers. A
//! [`SqlValue::List`] parameter stands for a whole `IN (...)` list and must be
//! expanded by the driver. Fetched rows come back grouped by table alias.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::error::Result;
pub use crate::sql::Statement;
use crate::value::SqlValue;

/// Column name to cell value for one table of one result row.
pub type Row = HashMap<String, SqlValue>;

/// One result row, split per table alias.
pub type AliasedRow = HashMap<String, Row>;

/// A table contributing columns to a SELECT, in projection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedTable {
    pub alias: String,
    pub table: String,
    /// Explicit column list, or `None` for `alias.*`
    pub columns: Option<Vec<String>>,
}

impl ProjectedTable {
    pub fn all(alias: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            table: table.into(),
            columns: None,
        }
    }

    pub fn columns(
        alias: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            alias: alias.into(),
            table: table.into(),
            columns: Some(columns.into_iter().map(Into::into).collect()),
        }
    }
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Generated key of the last inserted row
    pub insert_id: Option<i64>,
    pub affected_rows: u64,
    /// Rows whose content actually changed, when the driver can tell
    pub changed_rows: Option<u64>,
}

/// Executes rendered statements.
pub trait Storage {
    /// Runs a SELECT and splits each row according to `projection`.
    fn read(&self, statement: &Statement, projection: &[ProjectedTable])
    -> Result<Vec<AliasedRow>>;

    /// Runs an INSERT, UPDATE or DELETE.
    fn write(&self, statement: &Statement) -> Result<WriteOutcome>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn read(
        &self,
        statement: &Statement,
        projection: &[ProjectedTable],
    ) -> Result<Vec<AliasedRow>> {
        (**self).read(statement, projection)
    }

    fn write(&self, statement: &Statement) -> Result<WriteOutcome> {
        (**self).write(statement)
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read(
        &self,
        statement: &Statement,
        projection: &[ProjectedTable],
    ) -> Result<Vec<AliasedRow>> {
        (**self).read(statement, projection)
    }

    fn write(&self, statement: &Statement) -> Result<WriteOutcome> {
        (**self).write(statement)
    }
}

impl<S: Storage + ?Sized> Storage for Rc<S> {
    fn read(
        &self,
        statement: &Statement,
        projection: &[ProjectedTable],
    ) -> Result<Vec<AliasedRow>> {
        (**self).read(statement, projection)
    }

    fn write(&self, statement: &Statement) -> Result<WriteOutcome> {
        (**self).write(statement)
    }
}
