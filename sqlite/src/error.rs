use thiserror::Error;

use tether_core::TetherError;

/// Failures raised by the SQLite driver.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    /// The statement has more or fewer `?` markers than parameters
    #[error("statement has {markers} placeholders but {params} parameters")]
    ParamCount { markers: usize, params: usize },

    /// A list parameter reached the binder without being expanded
    #[error("list parameters must be expanded before binding")]
    UnexpandedList,

    /// The result row does not line up with the projected tables
    #[error("projection expects {expected} columns, the statement returned {actual}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("table `{0}` does not exist")]
    UnknownTable(String),
}

impl From<SqliteError> for TetherError {
    fn from(error: SqliteError) -> Self {
        TetherError::Storage(error.to_string())
    }
}
