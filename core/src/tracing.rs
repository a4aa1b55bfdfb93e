//! Tracing utilities for statement and entity lifecycle observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros expand to nothing when the feature is disabled, avoiding
//! `#[cfg]` boilerplate at every call site.

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use ::tracing as __tracing;

/// Emit a debug-level event with the SQL text and parameter count.
///
/// ```ignore
/// tether_trace_query!(&statement.sql, statement.params.len());
/// ```
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! tether_trace_query {
    ($sql:expr, $param_count:expr) => {
        $crate::tracing::__tracing::debug!(sql = %$sql, params = $param_count, "tether.query")
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! tether_trace_query {
    ($sql:expr, $param_count:expr) => {
        let _ = (&$sql, &$param_count);
    };
}

/// Emit a debug-level event for an entity lifecycle step (insert, update, delete).
///
/// ```ignore
/// tether_trace_entity!("insert", def.table());
/// ```
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! tether_trace_entity {
    ($event:literal, $table:expr) => {
        $crate::tracing::__tracing::debug!(event = $event, table = %$table, "tether.entity")
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! tether_trace_entity {
    ($event:literal, $table:expr) => {
        let _ = &$table;
    };
}

/// Emit a warning for storage results that disagree with expectations but
/// do not abort the current operation.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! tether_warn {
    ($($arg:tt)+) => {
        $crate::tracing::__tracing::warn!($($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! tether_warn {
    ($($arg:tt)+) => {};
}
