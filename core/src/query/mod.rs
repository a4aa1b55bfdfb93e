//! Entity queries: projection, joins, filters and relation loading.
//!
//! ```ignore
//! let dogs = Query::new(dogs())
//!     .r#where(eq("name", "Rex"))?
//!     .with("animal")?
//!     .with("tags")?
//!     .fetch(&db)?;
//! ```
//!
//! Relations loaded through joins are resolved from the same result rows;
//! the others register a post-fetch hook that issues one batched query per
//! relation.

mod builder;
mod sql;

pub use builder::WithRelation;

use core::fmt;
use std::borrow::Cow;
use std::rc::Rc;

use crate::db::Db;
use crate::entity::{Entity, EntityRef};
use crate::error::Result;
use crate::filter::{Filter, Selector};
use crate::join::JoinNode;
use crate::schema::EntityDef;
use crate::storage::AliasedRow;

/// Callback run after rows are materialized, in registration order.
///
/// `rows[i]` is the raw row `entities[i]` was built from, with the columns
/// of every selectable join.
pub type PostFetchHook = Rc<dyn Fn(&Db, &[EntityRef], &[AliasedRow]) -> Result<()>>;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

/// Query over one entity type.
#[derive(Clone)]
pub struct Query {
    def: &'static EntityDef,
    alias: Cow<'static, str>,
    columns: Option<Vec<&'static str>>,
    /// Base columns relations depend on, projected even when not selected
    required: Vec<&'static str>,
    joins: Vec<JoinNode>,
    filter: Option<Filter>,
    order: Vec<(Selector, OrderBy)>,
    limit: Option<u64>,
    offset: Option<u64>,
    hooks: Vec<PostFetchHook>,
}

impl Query {
    /// Selects every column of `def`, aliased by its table name.
    pub fn new(def: &'static EntityDef) -> Self {
        Self::aliased(def, def.table())
    }

    pub fn aliased(def: &'static EntityDef, alias: impl Into<Cow<'static, str>>) -> Self {
        Self {
            def,
            alias: alias.into(),
            columns: None,
            required: Vec::new(),
            joins: Vec::new(),
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: None,
            hooks: Vec::new(),
        }
    }

    #[inline]
    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    #[inline]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[inline]
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    #[inline]
    pub fn joins(&self) -> &[JoinNode] {
        &self.joins
    }

    /// Runs the query and materializes one entity per row.
    ///
    /// Rows whose primary key is null, as produced by outer joins, yield no
    /// entity. Post-fetch hooks run afterwards in registration order.
    pub fn fetch(&self, db: &Db) -> Result<Vec<EntityRef>> {
        let statement = self.to_sql()?;
        let projection = self.projection();
        let rows = db.read(&statement, &projection)?;

        let primary = self.def.primary().name();
        let mut entities = Vec::with_capacity(rows.len());
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(base) = row.get(self.alias.as_ref()) else {
                continue;
            };
            if base.get(primary).is_none_or(|key| key.is_null()) {
                continue;
            }
            entities.push(Entity::from_row(self.def, base)?.into_ref());
            kept.push(row);
        }

        for hook in &self.hooks {
            hook(db, &entities, &kept)?;
        }
        Ok(entities)
    }

    /// Fetches at most one entity.
    pub fn first(self, db: &Db) -> Result<Option<EntityRef>> {
        Ok(self.limit(1).fetch(db)?.into_iter().next())
    }

    /// Counts matching rows. Relations and ordering are ignored.
    pub fn count(&self, db: &Db) -> Result<u64> {
        let (statement, projection) = self.count_sql()?;
        let rows = db.read(&statement, &projection)?;
        let count = rows
            .first()
            .and_then(|row| row.get(sql::COUNT_ALIAS))
            .and_then(|row| row.get(sql::COUNT_ALIAS))
            .and_then(|value| value.as_i64())
            .unwrap_or_default();
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.def.table())
            .field("alias", &self.alias)
            .field("columns", &self.columns)
            .field("required", &self.required)
            .field("joins", &self.joins.len())
            .field("filter", &self.filter)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
