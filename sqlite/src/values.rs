//! Conversions between [`SqlValue`] and rusqlite values.

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use tether_core::SqlValue;

use crate::error::SqliteError;

/// Binds a [`SqlValue`] as a rusqlite parameter.
#[derive(Debug, Clone, Copy)]
pub struct Bind<'a>(pub &'a SqlValue);

impl rusqlite::ToSql for Bind<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self.0 {
            SqlValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            SqlValue::Integer(i) => Ok(ToSqlOutput::Owned(Value::Integer(*i))),
            SqlValue::Real(r) => Ok(ToSqlOutput::Owned(Value::Real(*r))),
            SqlValue::Text(s) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            SqlValue::Blob(b) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(b))),
            SqlValue::List(_) => Err(rusqlite::Error::ToSqlConversionFailure(Box::new(
                SqliteError::UnexpandedList,
            ))),
        }
    }
}

/// Copies a fetched cell.
pub fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(text) => SqlValue::Text(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => SqlValue::Blob(blob.to_vec()),
    }
}
