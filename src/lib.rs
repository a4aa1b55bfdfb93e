//! # tether
//!
//! Entity schemas, relation loading and change tracking over SQL databases.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::LazyLock;
//! use tether::prelude::*;
//! use tether::sqlite::SqliteStorage;
//!
//! static DOGS: LazyLock<EntityDef> = LazyLock::new(|| {
//!     EntityDef::builder("dogs")
//!         .column(ColumnDef::id("id"))
//!         .column(ColumnDef::string("name"))
//!         .build()
//!         .expect("valid dogs schema")
//! });
//! fn dogs() -> &'static EntityDef { &DOGS }
//!
//! # fn main() -> tether::Result<()> {
//! let storage = SqliteStorage::open_in_memory()?;
//! storage.execute_batch("CREATE TABLE dogs (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;
//! let db = Db::new(storage);
//!
//! let rex = Entity::with_values(dogs(), [("name", "Rex")])?.into_ref();
//! db.save(&rex)?;
//!
//! let found = Query::new(dogs()).r#where(eq("name", "Rex"))?.fetch(&db)?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! | Feature    | Default | Enables                                  |
//! |------------|---------|------------------------------------------|
//! | `rusqlite` | yes     | [`sqlite::SqliteStorage`]                |
//! | `tracing`  | yes     | statement and lifecycle events           |

// =============================================================================
// Root-level exports
// =============================================================================

/// Result type for tether operations
pub use tether_core::error::Result;

/// Error types
pub mod error {
    pub use tether_core::error::*;
}

pub use tether_core::{
    AliasedRow, ColumnDef, ColumnType, Config, Db, DefFn, Entity, EntityDef, EntityRef,
    EntityState, EventBus, Field, Filter, IntoFilter, JoinNode, JoinType, LifecycleEvent,
    LinkTable, Loaded, MatchMode, OrderBy, PostFetchHook, ProjectedTable, Query, Relation,
    RelationKind, Row, SaveOutcome, Selector, Sign, Sql, SqlValue, Statement, Storage,
    StructuredCodec, SubscriptionId, TetherError, Token, UpdatedEvent, Value, VersionedCodec,
    WithRelation, WriteKind, WriteOutcome, ZeroRowPolicy, escape_id,
};

/// Filter constructors: `eq`, `in_array`, `all`, ...
pub mod filter {
    pub use tether_core::filter::*;
}

/// Structured column encoding helpers.
pub mod codec {
    pub use tether_core::codec::*;
}

/// SQLite storage (rusqlite).
#[cfg(feature = "rusqlite")]
pub mod sqlite {
    pub use tether_sqlite::*;
}

/// Common imports for declaring entities and running queries.
pub mod prelude {
    pub use tether_core::prelude::*;
}
