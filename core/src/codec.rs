//! Column-type aware conversion between [`Field`] and [`SqlValue`].
//!
//! Every declared column encodes through [`encode`] before it is written or
//! compared against the entity snapshot, and decodes through [`decode`] when a
//! row is materialized. Structured columns may carry a [`StructuredCodec`]
//! that stamps a format version on the stored payload:
//!
//! ```text
//! {"v": 2, "data": { ... }}
//! ```
//!
//! Payloads written before a codec was attached have no tag and decode as
//! version 0.

use core::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::{CodecError, Result};
use crate::schema::{ColumnDef, ColumnType};
use crate::value::{Field, SqlValue, Value};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const VERSION_KEY: &str = "v";
const DATA_KEY: &str = "data";

/// Versioned encoding for compound column values.
pub trait StructuredCodec: Send + Sync + fmt::Debug {
    /// Version stamped on newly written payloads.
    fn version(&self) -> u32;

    /// Upgrades a payload written at `from` to the format one version later.
    fn upgrade(&self, from: u32, payload: serde_json::Value) -> core::result::Result<serde_json::Value, String>;
}

type Migration = fn(serde_json::Value) -> core::result::Result<serde_json::Value, String>;

/// A [`StructuredCodec`] defined by an ordered list of migrations.
///
/// Migration `i` upgrades a payload from version `i` to `i + 1`, so the
/// current version equals the number of migrations.
///
/// ```ignore
/// let codec = VersionedCodec::new()
///     .migration(|mut v| { v["tags"] = json!([]); Ok(v) });
/// assert_eq!(codec.version(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VersionedCodec {
    migrations: Vec<Migration>,
}

impl VersionedCodec {
    pub const fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    /// Appends a migration, bumping the current version by one.
    pub fn migration(mut self, migration: Migration) -> Self {
        self.migrations.push(migration);
        self
    }
}

impl StructuredCodec for VersionedCodec {
    fn version(&self) -> u32 {
        self.migrations.len() as u32
    }

    fn upgrade(&self, from: u32, payload: serde_json::Value) -> core::result::Result<serde_json::Value, String> {
        match self.migrations.get(from as usize) {
            Some(migration) => migration(payload),
            None => Err(format!("no migration from version {from}")),
        }
    }
}

/// Encodes a field for `column`. Absent fields have no storage
/// representation and yield `None`.
pub fn encode(column: &ColumnDef, field: &Field) -> Result<Option<SqlValue>> {
    match field {
        Field::Absent => Ok(None),
        Field::Null => Ok(Some(SqlValue::Null)),
        Field::Value(value) => encode_value(column, value).map(Some),
    }
}

/// Encodes a present value for `column`.
pub fn encode_value(column: &ColumnDef, value: &Value) -> Result<SqlValue> {
    let encoded = match (column.ty(), value) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnType::Integer, Value::Integer(i)) => SqlValue::Integer(*i),
        (ColumnType::Integer, Value::Boolean(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Number, Value::Number(n)) => SqlValue::Real(*n),
        (ColumnType::Number, Value::Integer(i)) => SqlValue::Real(*i as f64),
        (ColumnType::String, Value::Text(s)) => SqlValue::Text(s.clone()),
        (ColumnType::Boolean, Value::Boolean(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Date, Value::Date(d)) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        (ColumnType::Date, Value::DateTime(dt)) => {
            SqlValue::Text(dt.date().format(DATE_FORMAT).to_string())
        }
        (ColumnType::DateTime, Value::DateTime(dt)) => {
            SqlValue::Text(dt.format(DATETIME_FORMAT).to_string())
        }
        (ColumnType::Structured, value) => encode_structured(column, value)?,
        (ty, other) => return Err(mismatch(column, ty.as_str(), other.kind())),
    };
    Ok(encoded)
}

fn encode_structured(column: &ColumnDef, value: &Value) -> Result<SqlValue> {
    let json = match value {
        Value::Structured(json) => json.clone(),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Integer(i) => json!(i),
        Value::Number(n) => json!(n),
        Value::Boolean(b) => json!(b),
        other => return Err(mismatch(column, "structured", other.kind())),
    };
    let stored = match column.codec_ref() {
        Some(codec) => {
            let mut envelope = serde_json::Map::new();
            envelope.insert(VERSION_KEY.to_owned(), json!(codec.version()));
            envelope.insert(DATA_KEY.to_owned(), json);
            serde_json::Value::Object(envelope)
        }
        None => json,
    };
    Ok(SqlValue::Text(stored.to_string()))
}

/// Decodes a stored cell for `column`.
pub fn decode(column: &ColumnDef, raw: &SqlValue) -> Result<Field> {
    if raw.is_null() {
        return Ok(Field::Null);
    }
    let value = match (column.ty(), raw) {
        (ColumnType::Integer, SqlValue::Integer(i)) => Value::Integer(*i),
        (ColumnType::Integer, SqlValue::Text(s)) => s
            .parse()
            .map(Value::Integer)
            .map_err(|_| mismatch(column, "integer", "text"))?,
        (ColumnType::Number, SqlValue::Real(r)) => Value::Number(*r),
        (ColumnType::Number, SqlValue::Integer(i)) => Value::Number(*i as f64),
        (ColumnType::Number, SqlValue::Text(s)) => s
            .parse()
            .map(Value::Number)
            .map_err(|_| mismatch(column, "number", "text"))?,
        (ColumnType::String, SqlValue::Text(s)) => Value::Text(s.clone()),
        (ColumnType::String, SqlValue::Integer(i)) => Value::Text(i.to_string()),
        (ColumnType::Boolean, SqlValue::Integer(i)) => Value::Boolean(*i != 0),
        (ColumnType::Boolean, SqlValue::Text(s)) if s == "0" || s == "1" => {
            Value::Boolean(s == "1")
        }
        (ColumnType::Date, SqlValue::Text(s)) => Value::Date(parse_date(column, s)?),
        (ColumnType::DateTime, SqlValue::Text(s)) => Value::DateTime(parse_datetime(column, s)?),
        (ColumnType::Structured, SqlValue::Text(s)) => Value::Structured(decode_structured(column, s)?),
        (ColumnType::Structured, SqlValue::Blob(b)) => {
            let s = String::from_utf8_lossy(b);
            Value::Structured(decode_structured(column, &s)?)
        }
        (ty, other) => return Err(mismatch(column, ty.as_str(), other.kind())),
    };
    Ok(Field::Value(value))
}

fn decode_structured(column: &ColumnDef, text: &str) -> Result<serde_json::Value> {
    let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| CodecError::Json {
        column: column.name().to_owned(),
        message: e.to_string(),
    })?;
    let Some(codec) = column.codec_ref() else {
        return Ok(parsed);
    };
    let (mut version, mut payload) = split_envelope(parsed);
    let current = codec.version();
    if version > current {
        return Err(CodecError::UnsupportedVersion {
            column: column.name().to_owned(),
            found: version,
            current,
        }
        .into());
    }
    while version < current {
        payload = codec
            .upgrade(version, payload)
            .map_err(|message| CodecError::Migration {
                column: column.name().to_owned(),
                from: version,
                message,
            })?;
        version += 1;
    }
    Ok(payload)
}

/// Splits a stored payload into `(version, data)`, treating untagged payloads
/// as version 0.
fn split_envelope(stored: serde_json::Value) -> (u32, serde_json::Value) {
    match stored {
        serde_json::Value::Object(mut map)
            if map.len() == 2 && map.contains_key(DATA_KEY) && map.get(VERSION_KEY).is_some_and(serde_json::Value::is_u64) =>
        {
            let version = map
                .get(VERSION_KEY)
                .and_then(serde_json::Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or_default();
            let data = map.remove(DATA_KEY).unwrap_or_default();
            (version, data)
        }
        other => (0, other),
    }
}

fn parse_date(column: &ColumnDef, s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map(|dt| dt.date()))
        .map_err(|_| invalid_temporal(column, "date", s))
}

fn parse_datetime(column: &ColumnDef, s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, DATE_FORMAT).map(|d| d.and_time(NaiveTime::default()))
        })
        .map_err(|_| invalid_temporal(column, "datetime", s))
}

fn mismatch(column: &ColumnDef, expected: &'static str, found: &str) -> crate::error::TetherError {
    CodecError::TypeMismatch {
        column: column.name().to_owned(),
        expected,
        found: found.to_owned(),
    }
    .into()
}

fn invalid_temporal(column: &ColumnDef, kind: &'static str, value: &str) -> crate::error::TetherError {
    CodecError::InvalidTemporal {
        column: column.name().to_owned(),
        kind,
        value: value.to_owned(),
    }
    .into()
}

/// Converts a serializable value into a structured [`Value`].
pub fn to_structured<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map(Value::Structured)
        .map_err(|e| {
            CodecError::Json {
                column: String::new(),
                message: e.to_string(),
            }
            .into()
        })
}

/// Reads a structured [`Value`] back into a typed value.
pub fn from_structured<T: DeserializeOwned>(value: &Value) -> Result<T> {
    let json = match value {
        Value::Structured(json) => json.clone(),
        other => {
            return Err(CodecError::TypeMismatch {
                column: String::new(),
                expected: "structured",
                found: other.kind().to_owned(),
            }
            .into());
        }
    };
    serde_json::from_value(json).map_err(|e| {
        CodecError::Json {
            column: String::new(),
            message: e.to_string(),
        }
        .into()
    })
}
