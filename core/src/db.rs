//! Database handle: storage, lifecycle events and runtime configuration.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{self, EntityRef, SaveOutcome};
use crate::error::{Result, TetherError};
use crate::events::EventBus;
use crate::filter::eq;
use crate::query::Query;
use crate::schema::EntityDef;
use crate::storage::{AliasedRow, ProjectedTable, Statement, Storage, WriteOutcome};
use crate::value::Value;
use crate::{tether_trace_query, tether_warn};

/// What to do when a write reports zero affected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroRowPolicy {
    /// Log a warning and carry on
    #[default]
    Warn,
    /// Fail with [`TetherError::NoRowsAffected`]
    Error,
}

/// Runtime configuration.
///
/// Deserializable so it can live in an application's own config file:
///
/// ```ignore
/// let config: Config = serde_json::from_str(r#"{"zero_row_policy": "error"}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub zero_row_policy: ZeroRowPolicy,
    /// Emit every statement as a `tether.query` debug event
    pub log_statements: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zero_row_policy: ZeroRowPolicy::Warn,
            log_statements: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zero_row_policy(mut self, policy: ZeroRowPolicy) -> Self {
        self.zero_row_policy = policy;
        self
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }
}

/// Entry point for queries and persistence.
pub struct Db {
    storage: Box<dyn Storage>,
    events: EventBus,
    config: Config,
}

impl Db {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self::with_config(storage, Config::default())
    }

    pub fn with_config(storage: impl Storage + 'static, config: Config) -> Self {
        Self {
            storage: Box::new(storage),
            events: EventBus::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[inline]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Runs a SELECT through the storage.
    pub fn read(
        &self,
        statement: &Statement,
        projection: &[ProjectedTable],
    ) -> Result<Vec<AliasedRow>> {
        if self.config.log_statements {
            tether_trace_query!(&statement.sql, statement.params.len());
        }
        self.storage.read(statement, projection)
    }

    /// Runs a write statement through the storage.
    pub fn write(&self, statement: &Statement) -> Result<WriteOutcome> {
        if self.config.log_statements {
            tether_trace_query!(&statement.sql, statement.params.len());
        }
        self.storage.write(statement)
    }

    /// Inserts a transient entity or updates a persisted one.
    pub fn save(&self, entity: &EntityRef) -> Result<SaveOutcome> {
        entity::save(self, entity)
    }

    /// Deletes a persisted entity.
    pub fn delete(&self, entity: &EntityRef) -> Result<()> {
        entity::delete(self, entity)
    }

    /// Fetches the entity with primary key `key`.
    pub fn find(&self, def: &'static EntityDef, key: impl Into<Value>) -> Result<Option<EntityRef>> {
        Query::new(def)
            .r#where(eq(def.primary().name(), key))?
            .first(self)
    }

    /// Applies the zero-row policy to a write result.
    pub(crate) fn check_affected(
        &self,
        affected: u64,
        describe: impl FnOnce() -> String,
    ) -> Result<()> {
        if affected > 0 {
            return Ok(());
        }
        let what = describe();
        match self.config.zero_row_policy {
            ZeroRowPolicy::Warn => {
                tether_warn!(operation = %what, "write affected no rows");
                Ok(())
            }
            ZeroRowPolicy::Error => Err(TetherError::NoRowsAffected(what)),
        }
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("events", &self.events)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
