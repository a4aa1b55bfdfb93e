use thiserror::Error;

/// Top-level error for every fallible tether operation.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Malformed builder input, raised before any statement is issued
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// Entity state would reach storage in an inconsistent shape
    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// A relation could not be resolved or synchronized
    #[error("Relation error: {0}")]
    Relation(#[from] RelationError),

    /// Converting between in-memory and storage values failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Error reported by the storage collaborator
    #[error("Storage error: {0}")]
    Storage(String),

    /// A write affected zero rows while `ZeroRowPolicy::Error` is configured
    #[error("No rows affected: {0}")]
    NoRowsAffected(String),
}

/// Build-time usage errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("an empty list cannot be used as a filter")]
    EmptyFilter,

    #[error("IN comparison on `{column}` requires a list value")]
    InExpectsList { column: String },

    #[error("`{sign}` comparison on `{column}` cannot take a {operand} operand")]
    InvalidOperand {
        column: String,
        sign: &'static str,
        operand: &'static str,
    },

    #[error("entity definition is missing a table name")]
    MissingTable,

    #[error("entity `{table}` declares no primary column")]
    MissingPrimary { table: String },

    #[error("entity `{table}` declares `{second}` as primary but `{first}` is already primary")]
    DuplicatePrimary {
        table: String,
        first: String,
        second: String,
    },

    #[error("entity `{table}` declares column `{column}` twice")]
    DuplicateColumn { table: String, column: String },

    #[error("entity `{table}` declares relation `{relation}` twice")]
    DuplicateRelation { table: String, relation: String },

    #[error("entity `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("entity `{table}` has no relation `{relation}`")]
    UnknownRelation { table: String, relation: String },

    #[error("relation `{relation}` is not {expected}")]
    WrongRelationKind {
        relation: String,
        expected: &'static str,
    },

    #[error("relation `{relation}` is required and cannot be unset")]
    RequiredRelation { relation: String },

    #[error("relation `{relation}` expects `{expected}` entities, got `{found}`")]
    WrongTarget {
        relation: String,
        expected: String,
        found: String,
    },
}

/// Entity state that must not reach storage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error(
        "foreign key `{table}`.`{column}` was modified directly; use the relation-setting operation for `{relation}` instead"
    )]
    ForeignKeyModified {
        table: String,
        column: String,
        relation: String,
    },

    #[error("relation `{relation}` on `{table}` references an entity that has not been saved")]
    UnsavedTarget { table: String, relation: String },

    #[error("auto-increment primary key `{table}`.`{column}` cannot be assigned manually")]
    ManualAutoIncrement { table: String, column: String },

    #[error("entity `{table}` is marked as persisted but has no primary key")]
    MissingPrimaryKey { table: String },

    #[error("column `{table}`.`{column}` is required but has no value")]
    MissingColumn { table: String, column: String },

    #[error("column `{table}`.`{column}` is not nullable")]
    NullColumn { table: String, column: String },

    #[error("entity `{table}` does not exist in storage")]
    NotPersisted { table: String },
}

/// Relation resolution failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelationError {
    #[error("no `{target}` row with primary key {key} for required relation of `{source_table}`")]
    MissingTarget {
        source_table: String,
        target: String,
        key: String,
    },

    #[error("{operation} on `{link_table}` affected {actual} rows, expected {expected}")]
    LinkMismatch {
        link_table: String,
        operation: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// Value conversion failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("column `{column}` expects {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("column `{column}` holds an invalid {kind}: {value}")]
    InvalidTemporal {
        column: String,
        kind: &'static str,
        value: String,
    },

    #[error("column `{column}` holds invalid JSON: {message}")]
    Json { column: String, message: String },

    #[error("column `{column}` was encoded with version {found}, newer than supported {current}")]
    UnsupportedVersion {
        column: String,
        found: u32,
        current: u32,
    },

    #[error("column `{column}` migration from version {from}: {message}")]
    Migration {
        column: String,
        from: u32,
        message: String,
    },
}

/// Result type for tether operations
pub type Result<T> = std::result::Result<T, TetherError>;
