//! Core of tether: entity schemas, the filter compiler, relation loading and
//! change-tracked persistence.
//!
//! Storage drivers implement [`Storage`]; everything else in this crate is
//! driver independent.

pub mod codec;
pub mod db;
pub mod entity;
pub mod error;
pub mod events;
pub mod filter;
pub mod join;
pub mod query;
pub mod relation;
pub mod schema;
pub mod sql;
pub mod storage;
pub mod tracing;
pub mod value;

// Re-export key types and traits
pub use codec::{StructuredCodec, VersionedCodec};
pub use db::{Config, Db, ZeroRowPolicy};
pub use entity::{Entity, EntityRef, EntityState, Loaded, SaveOutcome};
pub use error::{Result, TetherError};
pub use events::{EventBus, LifecycleEvent, SubscriptionId, UpdatedEvent};
pub use filter::{Filter, IntoFilter, MatchMode, Selector, Sign};
pub use join::{JoinNode, JoinType};
pub use query::{OrderBy, PostFetchHook, Query, WithRelation};
pub use relation::{LinkTable, Relation, RelationKind};
pub use schema::{ColumnDef, ColumnType, DefFn, EntityDef, WriteKind};
pub use sql::{Sql, Statement, Token, escape_id};
pub use storage::{AliasedRow, ProjectedTable, Row, Storage, WriteOutcome};
pub use value::{Field, SqlValue, Value};

/// Everything needed to declare entities and run queries.
pub mod prelude {
    pub use crate::filter::conditions::*;
    pub use crate::{
        ColumnDef, Db, Entity, EntityDef, EntityRef, Field, Filter, OrderBy, Query, Relation,
        SaveOutcome, Selector, Sign, Value,
    };
}
