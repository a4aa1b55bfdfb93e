//! [`Storage`] over a rusqlite connection.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;
use hashbrown::HashMap;
use rusqlite::{Connection, params_from_iter};
use tether_core::storage::{AliasedRow, ProjectedTable, Row, Statement, Storage, WriteOutcome};
use tether_core::{Result, escape_id};

use crate::error::SqliteError;
use crate::params::expand_params;
use crate::values::{Bind, from_value_ref};

/// SQLite storage backed by a single connection.
///
/// `alias.*` projections are split using the table's declared column order,
/// read once per table with `PRAGMA table_info` and cached.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    columns: RefCell<HashMap<CompactString, Rc<[CompactString]>>>,
}

impl SqliteStorage {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            columns: RefCell::new(HashMap::new()),
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(SqliteError::from)?;
        Ok(Self::new(conn))
    }

    #[inline]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs DDL or other statements without parameters.
    ///
    /// Forgets cached table layouts, since the batch may alter tables.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(SqliteError::from)?;
        self.columns.borrow_mut().clear();
        Ok(())
    }

    /// Declared column names of `table`, in order.
    fn table_columns(&self, table: &str) -> Result<Rc<[CompactString]>> {
        if let Some(columns) = self.columns.borrow().get(table) {
            return Ok(Rc::clone(columns));
        }

        let sql = format!("PRAGMA table_info({})", escape_id(table));
        let mut stmt = self.conn.prepare(&sql).map_err(SqliteError::from)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(SqliteError::from)?
            .map(|name| name.map(CompactString::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(SqliteError::from)?;
        if names.is_empty() {
            return Err(SqliteError::UnknownTable(table.to_owned()).into());
        }

        let names: Rc<[CompactString]> = names.into();
        self.columns
            .borrow_mut()
            .insert(CompactString::from(table), Rc::clone(&names));
        Ok(names)
    }

    /// Column names of every projected table, in projection order.
    fn layout(&self, projection: &[ProjectedTable]) -> Result<Vec<Rc<[CompactString]>>> {
        projection
            .iter()
            .map(|table| match &table.columns {
                Some(columns) => Ok(columns
                    .iter()
                    .map(|column| CompactString::from(column.as_str()))
                    .collect()),
                None => self.table_columns(&table.table),
            })
            .collect()
    }
}

impl Storage for SqliteStorage {
    fn read(
        &self,
        statement: &Statement,
        projection: &[ProjectedTable],
    ) -> Result<Vec<AliasedRow>> {
        let layout = self.layout(projection)?;
        let expected = layout.iter().map(|columns| columns.len()).sum::<usize>();
        let (sql, params) = expand_params(statement)?;

        let mut stmt = self.conn.prepare(&sql).map_err(SqliteError::from)?;
        let actual = stmt.column_count();
        if actual != expected {
            return Err(SqliteError::ColumnCount { expected, actual }.into());
        }

        let mut rows = stmt
            .query(params_from_iter(params.iter().map(Bind)))
            .map_err(SqliteError::from)?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(SqliteError::from)? {
            let mut aliased = AliasedRow::with_capacity(projection.len());
            let mut index = 0;
            for (table, columns) in projection.iter().zip(&layout) {
                let mut cells = Row::with_capacity(columns.len());
                for column in columns.iter() {
                    let value = row.get_ref(index).map_err(SqliteError::from)?;
                    cells.insert(column.to_string(), from_value_ref(value));
                    index += 1;
                }
                aliased.insert(table.alias.clone(), cells);
            }
            result.push(aliased);
        }
        Ok(result)
    }

    fn write(&self, statement: &Statement) -> Result<WriteOutcome> {
        let (sql, params) = expand_params(statement)?;
        let affected = self
            .conn
            .execute(&sql, params_from_iter(params.iter().map(Bind)))
            .map_err(SqliteError::from)?;

        let is_insert = sql
            .trim_start()
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"));
        Ok(WriteOutcome {
            insert_id: is_insert.then(|| self.conn.last_insert_rowid()),
            affected_rows: affected as u64,
            changed_rows: None,
        })
    }
}
