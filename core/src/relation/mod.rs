//! Relation descriptors and eager loading.
//!
//! A [`Relation`] is declared once on an [`EntityDef`] and describes how to
//! reach related entities. It never holds loaded data; loaded targets live
//! in the owning [`Entity`](crate::entity::Entity)'s relation slots.
//!
//! ```ignore
//! EntityDef::builder("dogs")
//!     .column(ColumnDef::id("id"))
//!     .column(ColumnDef::integer("animal_id"))
//!     .column(ColumnDef::integer("owner_id").nullable())
//!     .relation(Relation::belongs_to("animal", animals, "animal_id"))
//!     .relation(Relation::belongs_to("owner", owners, "owner_id").optional())
//!     .relation(Relation::many_to_many("tags", tags))
//!     .build()
//! ```
//!
//! Belongs-to relations are resolved from a join on the owner query. Every
//! other kind issues one batched query per relation level, whatever the
//! number of owners.

mod belongs_to;
mod has_many;
mod many_to_many;

pub use many_to_many::LinkTable;

use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::db::Db;
use crate::entity::{EntityRef, Loaded};
use crate::error::{Result, UsageError};
use crate::query::{OrderBy, Query, WithRelation};
use crate::schema::{DefFn, EntityDef};
use crate::value::{SqlValue, Value};

/// How a relation reaches its targets.
#[derive(Debug, Clone)]
pub enum RelationKind {
    /// Single target; the foreign key lives on the owner
    BelongsTo {
        foreign_key: &'static str,
        optional: bool,
    },
    /// Single target; the foreign key lives on the target
    HasOne { foreign_key: &'static str },
    /// Many targets; the foreign key lives on the target
    HasMany {
        foreign_key: &'static str,
        order: Option<(&'static str, OrderBy)>,
    },
    /// Many targets through a link table
    ManyToMany(LinkTable),
}

impl RelationKind {
    /// Whether the relation slot holds at most one entity.
    pub const fn is_single(&self) -> bool {
        matches!(self, RelationKind::BelongsTo { .. } | RelationKind::HasOne { .. })
    }

    const fn describe(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo { .. } => "a belongs-to relation",
            RelationKind::HasOne { .. } => "a has-one relation",
            RelationKind::HasMany { .. } => "a has-many relation",
            RelationKind::ManyToMany(_) => "a many-to-many relation",
        }
    }
}

/// A declared association between two entity types.
#[derive(Clone)]
pub struct Relation {
    name: &'static str,
    target: DefFn,
    kind: RelationKind,
    nested: Vec<Relation>,
}

impl Relation {
    /// Single-valued relation through `foreign_key` on the owner.
    pub fn belongs_to(name: &'static str, target: DefFn, foreign_key: &'static str) -> Self {
        Self::new(
            name,
            target,
            RelationKind::BelongsTo {
                foreign_key,
                optional: false,
            },
        )
    }

    /// Single-valued relation through `foreign_key` on the target.
    pub fn has_one(name: &'static str, target: DefFn, foreign_key: &'static str) -> Self {
        Self::new(name, target, RelationKind::HasOne { foreign_key })
    }

    /// Multi-valued relation through `foreign_key` on the target.
    pub fn has_many(name: &'static str, target: DefFn, foreign_key: &'static str) -> Self {
        Self::new(
            name,
            target,
            RelationKind::HasMany {
                foreign_key,
                order: None,
            },
        )
    }

    /// Multi-valued relation through a link table.
    ///
    /// The link table defaults to both table names, sorted and joined with
    /// `_`; link columns default to `<table><PrimaryKey>`.
    pub fn many_to_many(name: &'static str, target: DefFn) -> Self {
        Self::new(name, target, RelationKind::ManyToMany(LinkTable::default()))
    }

    fn new(name: &'static str, target: DefFn, kind: RelationKind) -> Self {
        Self {
            name,
            target,
            kind,
            nested: Vec::new(),
        }
    }

    /// Allows a belongs-to target to be missing. Joins become LEFT joins.
    pub fn optional(mut self) -> Self {
        if let RelationKind::BelongsTo { optional, .. } = &mut self.kind {
            *optional = true;
        }
        self
    }

    /// Sorts loaded targets. On a many-to-many relation `column` belongs to
    /// the link table.
    pub fn order_by(mut self, column: &'static str, direction: OrderBy) -> Self {
        match &mut self.kind {
            RelationKind::HasMany { order, .. } => *order = Some((column, direction)),
            RelationKind::ManyToMany(link) => link.order = Some((column, direction)),
            RelationKind::BelongsTo { .. } | RelationKind::HasOne { .. } => {}
        }
        self
    }

    /// Uses an explicit link table name.
    pub fn link_table(mut self, table: &'static str) -> Self {
        if let RelationKind::ManyToMany(link) = &mut self.kind {
            link.table = Some(table);
        }
        self
    }

    /// Uses the table of a declared link entity.
    pub fn link_entity(mut self, entity: DefFn) -> Self {
        if let RelationKind::ManyToMany(link) = &mut self.kind {
            link.entity = Some(entity);
        }
        self
    }

    /// Overrides the link column names.
    pub fn link_columns(mut self, owner: &'static str, target: &'static str) -> Self {
        if let RelationKind::ManyToMany(link) = &mut self.kind {
            link.owner_column = Some(owner);
            link.target_column = Some(target);
        }
        self
    }

    /// Also loads `nested` on every target of this relation.
    ///
    /// ```ignore
    /// dogs().relation("owner")?.clone().with("animal")?;
    /// Relation::has_many("dogs", dogs, "owner_id").with("tags.dogs")?;
    /// ```
    pub fn with(mut self, nested: impl WithRelation) -> Result<Self> {
        let nested = nested.resolve(self.target())?;
        self.nested.push(nested);
        Ok(self)
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn target(&self) -> &'static EntityDef {
        (self.target)()
    }

    #[inline]
    pub const fn kind(&self) -> &RelationKind {
        &self.kind
    }

    #[inline]
    pub fn nested(&self) -> &[Relation] {
        &self.nested
    }

    /// Attaches this relation to `query`, as a join or a post-fetch hook.
    pub fn apply(self, query: Query) -> Result<Query> {
        match self.kind {
            RelationKind::BelongsTo { .. } => belongs_to::apply(self, query),
            _ => Ok(self.apply_batched(query)),
        }
    }

    fn apply_batched(self, query: Query) -> Query {
        query.hook(move |db, owners, _| self.load(db, owners).map(drop))
    }

    /// Loads this relation on every entity of `owners` with at most one
    /// query, and returns the distinct targets loaded.
    ///
    /// No query is issued when no owner has a key to match on.
    pub fn load(&self, db: &Db, owners: &[EntityRef]) -> Result<Vec<EntityRef>> {
        let Some(first) = owners.first() else {
            return Ok(Vec::new());
        };
        let owner = first.borrow().def();
        match &self.kind {
            RelationKind::BelongsTo { .. } => belongs_to::load(self, db, owner, owners),
            RelationKind::HasOne { .. } | RelationKind::HasMany { .. } => {
                has_many::load(self, db, owner, owners)
            }
            RelationKind::ManyToMany(_) => many_to_many::load(self, db, owner, owners),
        }
    }

    /// Sets a single-valued relation on `owner` and keeps the foreign key in
    /// step with it.
    ///
    /// This is the supported way to change a belongs-to foreign key; writing
    /// the column directly while the relation is loaded fails on save.
    pub fn assign(&self, owner: &EntityRef, target: Option<&EntityRef>) -> Result<()> {
        if let Some(target) = target {
            self.check_target(target)?;
        }
        match &self.kind {
            RelationKind::BelongsTo { optional: false, .. } if target.is_none() => {
                Err(UsageError::RequiredRelation {
                    relation: self.name.to_owned(),
                }
                .into())
            }
            RelationKind::BelongsTo { foreign_key, .. } => {
                belongs_to::assign(self, *foreign_key, owner, target)
            }
            RelationKind::HasOne { foreign_key } => {
                has_many::assign_one(self, *foreign_key, owner, target)
            }
            _ => Err(self.wrong_kind("single-valued")),
        }
    }

    fn check_target(&self, entity: &EntityRef) -> Result<()> {
        let found = entity.borrow().def();
        if found.is(self.target()) {
            return Ok(());
        }
        Err(UsageError::WrongTarget {
            relation: self.name.to_owned(),
            expected: self.target().table().to_owned(),
            found: found.table().to_owned(),
        }
        .into())
    }

    fn wrong_kind(&self, expected: &'static str) -> crate::error::TetherError {
        UsageError::WrongRelationKind {
            relation: self.name.to_owned(),
            expected,
        }
        .into()
    }

    /// Applies the nested relations to a secondary query.
    fn with_nested(&self, mut query: Query) -> Result<Query> {
        for nested in &self.nested {
            query = query.with(nested.clone())?;
        }
        Ok(query)
    }
}

impl core::fmt::Debug for Relation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("target", &self.target().table())
            .field("kind", &self.kind.describe())
            .field("nested", &self.nested)
            .finish()
    }
}

// ==================== key helpers ====================

/// De-duplicated non-null keys of the column at `index`.
///
/// `params` are the encoded keys used to match rows, `values` the in-memory
/// values used as filter operands.
#[derive(Debug, Default)]
struct Keys {
    params: HashSet<SqlValue>,
    values: Vec<Value>,
}

impl Keys {
    fn collect(entities: &[EntityRef], index: usize) -> Result<Self> {
        let mut keys = Keys::default();
        for entity in entities {
            let entity = entity.borrow();
            let Some(key) = entity.key_at(index)? else {
                continue;
            };
            if keys.params.insert(key)
                && let Some(value) = entity.field_at(index).value()
            {
                keys.values.push(value.clone());
            }
        }
        Ok(keys)
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Groups `entities` by the encoded key at `index`, keeping fetch order.
fn group_by(entities: &[EntityRef], index: usize) -> Result<HashMap<SqlValue, Vec<EntityRef>>> {
    let mut groups: HashMap<SqlValue, Vec<EntityRef>> = HashMap::new();
    for entity in entities {
        let Some(key) = entity.borrow().key_at(index)? else {
            continue;
        };
        groups.entry(key).or_default().push(Rc::clone(entity));
    }
    Ok(groups)
}

/// Gives every owner an empty slot for `relation`.
fn clear_slots(relation: &Relation, owners: &[EntityRef]) {
    for owner in owners {
        let empty = if relation.kind.is_single() {
            Loaded::One(None)
        } else {
            Loaded::Many(Vec::new())
        };
        owner.borrow_mut().set_loaded(relation.name, empty);
    }
}
