//! In-memory and storage-wire value types.
//!
//! [`Value`] is what application code reads and writes on an entity,
//! [`Field`] adds the "never fetched or assigned" state on top of it, and
//! [`SqlValue`] is what crosses the storage boundary as a statement parameter
//! or a fetched cell.

use core::fmt;
use core::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};

use crate::codec::{DATE_FORMAT, DATETIME_FORMAT};

/// An in-memory column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Compound value stored through a structured column
    Structured(serde_json::Value),
    /// Only meaningful as a filter operand (`IN (...)`)
    List(Vec<Value>),
}

impl Value {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub const fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Short type name used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Structured(_) => "structured",
            Value::List(_) => "list",
        }
    }

    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Schema-independent conversion to a statement parameter.
    ///
    /// Columns with a declared type go through [`crate::codec::encode`]
    /// instead; this is used for filter operands whose column type is not
    /// resolved at compile time.
    pub fn to_param(&self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Number(n) => SqlValue::Real(*n),
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
            Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
            Value::Structured(json) => SqlValue::Text(json.to_string()),
            Value::List(items) => SqlValue::List(items.iter().map(Value::to_param).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Structured(json) => write!(f, "{json}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_value_from!(
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    f32 => Number,
    f64 => Number,
    bool => Boolean,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    serde_json::Value => Structured,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(values: [T; N]) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// Three-state column slot on an entity instance.
///
/// `Absent` means the column was never fetched or assigned, which is
/// different from an explicit `Null`. `Value` never wraps [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field {
    #[default]
    Absent,
    Null,
    Value(Value),
}

impl Field {
    #[inline]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    #[inline]
    pub const fn is_present(&self) -> bool {
        !self.is_absent()
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// The held value, `None` for both absent and null.
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to a plain value, treating absent as `None`.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Field::Absent => None,
            Field::Null => Some(Value::Null),
            Field::Value(v) => Some(v.clone()),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Field::Null,
            other => Field::Value(other),
        }
    }
}

impl From<Option<Value>> for Field {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Field::Absent, Field::from)
    }
}

/// A value as exchanged with the storage collaborator.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default)]
pub enum SqlValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// List parameter; the storage expands it into `(?, ?, ...)`
    List(Vec<SqlValue>),
}

impl SqlValue {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
            SqlValue::List(_) => "list",
        }
    }

    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

// Keys are grouped by `SqlValue`. Reals hash by bit pattern, so NaN keys
// never match and zero keys only match their own sign.
impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            SqlValue::Null => {}
            SqlValue::Integer(i) => i.hash(state),
            SqlValue::Real(r) => r.to_bits().hash(state),
            SqlValue::Text(s) => s.hash(state),
            SqlValue::Blob(b) => b.hash(state),
            SqlValue::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) => write!(f, "{r}"),
            SqlValue::Text(s) => write!(f, "'{s}'"),
            SqlValue::Blob(b) => write!(f, "x'{}'", b.iter().map(|b| format!("{b:02x}")).collect::<String>()),
            SqlValue::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}
