use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use heck::ToUpperCamelCase;

use super::{Keys, Relation, RelationKind, clear_slots};
use crate::db::Db;
use crate::entity::{EntityRef, Loaded};
use crate::error::{ConsistencyError, RelationError, Result};
use crate::filter::{Selector, eq_columns, in_array};
use crate::join::{JoinNode, JoinType};
use crate::query::{OrderBy, Query};
use crate::schema::{DefFn, EntityDef};
use crate::sql::{Sql, Token};
use crate::storage::Statement;
use crate::tether_warn;
use crate::value::{SqlValue, Value};

/// Link table settings of a many-to-many relation. Unset parts fall back to
/// naming conventions.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    pub(super) table: Option<&'static str>,
    pub(super) entity: Option<DefFn>,
    pub(super) owner_column: Option<&'static str>,
    pub(super) target_column: Option<&'static str>,
    pub(super) order: Option<(&'static str, OrderBy)>,
}

/// Link table and column names resolved for one owner type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub table: Cow<'static, str>,
    pub owner_column: Cow<'static, str>,
    pub target_column: Cow<'static, str>,
}

impl LinkTable {
    pub(super) fn resolve(&self, owner: &EntityDef, target: &EntityDef) -> ResolvedLink {
        let table = match (self.table, self.entity) {
            (Some(table), _) => Cow::Borrowed(table),
            (None, Some(entity)) => Cow::Borrowed(entity().table()),
            (None, None) => {
                let mut tables = [owner.table(), target.table()];
                tables.sort_unstable();
                Cow::Owned(tables.join("_"))
            }
        };
        let owner_column = self
            .owner_column
            .map_or_else(|| Cow::Owned(link_column(owner)), Cow::Borrowed);
        let target_column = self.target_column.map_or_else(
            || {
                let mut column = link_column(target);
                if owner.is(target) {
                    column.push('2');
                }
                Cow::Owned(column)
            },
            Cow::Borrowed,
        );
        ResolvedLink {
            table,
            owner_column,
            target_column,
        }
    }
}

/// `<table><PrimaryKey>`, e.g. `dogsId`.
fn link_column(def: &EntityDef) -> String {
    format!("{}{}", def.table(), def.primary().name().to_upper_camel_case())
}

type LinkOrder = Option<(&'static str, OrderBy)>;

fn link_of(relation: &Relation, owner: &EntityDef) -> Result<(ResolvedLink, LinkOrder)> {
    match relation.kind() {
        RelationKind::ManyToMany(link) => {
            Ok((link.resolve(owner, relation.target()), link.order))
        }
        _ => Err(relation.wrong_kind("a many-to-many relation")),
    }
}

/// One query joining targets to the link table, grouped back onto owners.
///
/// Targets linked to several owners are shared: every owner's list holds the
/// same instance.
pub(super) fn load(
    relation: &Relation,
    db: &Db,
    owner: &'static EntityDef,
    owners: &[EntityRef],
) -> Result<Vec<EntityRef>> {
    let (link, order) = link_of(relation, owner)?;
    let target = relation.target();

    let keys = Keys::collect(owners, owner.primary_index())?;
    if keys.is_empty() {
        clear_slots(relation, owners);
        return Ok(Vec::new());
    }

    let on = eq_columns(
        Selector::new(link.target_column.clone()),
        Selector::new(target.primary().name()).of(target.table()),
    );
    let mut query = Query::new(target)
        .join_node(JoinNode::table(JoinType::Inner, link.table.clone(), link.table.clone(), on))
        .r#where(in_array(
            Selector::new(link.owner_column.clone()).of(link.table.clone()),
            keys.values,
        ))?;
    if let Some((column, direction)) = order {
        query = query.order_by(Selector::new(column).of(link.table.clone()), direction);
    }

    // Rows carry the owner key in the link table's columns
    let owner_keys: Rc<RefCell<Vec<Option<SqlValue>>>> = Rc::default();
    let sink = Rc::clone(&owner_keys);
    let (link_alias, owner_column) = (link.table.clone(), link.owner_column.clone());
    query = query.hook(move |_, _, rows| {
        sink.borrow_mut().extend(rows.iter().map(|row| {
            row.get(link_alias.as_ref())
                .and_then(|linked| linked.get(owner_column.as_ref()))
                .filter(|key| !key.is_null())
                .cloned()
        }));
        Ok(())
    });
    let fetched = relation.with_nested(query)?.fetch(db)?;
    let owner_keys = owner_keys.take();

    let mut distinct: Vec<EntityRef> = Vec::new();
    let mut by_key: HashMap<SqlValue, EntityRef> = HashMap::new();
    let mut groups: HashMap<SqlValue, Vec<EntityRef>> = HashMap::new();
    for (entity, owner_key) in fetched.into_iter().zip(owner_keys) {
        let (Some(owner_key), Some(key)) = (owner_key, entity.borrow().primary_key_param()?) else {
            continue;
        };
        let entity = by_key
            .entry(key)
            .or_insert_with(|| {
                distinct.push(Rc::clone(&entity));
                entity
            })
            .clone();
        let group = groups.entry(owner_key).or_default();
        if !group.iter().any(|linked| Rc::ptr_eq(linked, &entity)) {
            group.push(entity);
        }
    }

    for owner in owners {
        let key = owner.borrow().primary_key_param()?;
        let linked = key.and_then(|key| groups.get(&key).cloned()).unwrap_or_default();
        owner
            .borrow_mut()
            .set_loaded(relation.name(), Loaded::Many(linked));
    }
    Ok(distinct)
}

// ==================== link primitives ====================

/// Owner key, resolved link and whether the relation is loaded on the owner.
struct LinkContext {
    table: &'static str,
    link: ResolvedLink,
    owner_key: SqlValue,
    loaded: bool,
}

impl Relation {
    fn link_context(&self, owner: &EntityRef) -> Result<LinkContext> {
        let owner = owner.borrow();
        let (link, _) = link_of(self, owner.def())?;
        let Some(owner_key) = owner.primary_key_param()?.filter(|_| owner.exists()) else {
            return Err(ConsistencyError::NotPersisted {
                table: owner.table().to_owned(),
            }
            .into());
        };
        Ok(LinkContext {
            table: owner.table(),
            link,
            owner_key,
            loaded: owner.is_loaded(self.name()),
        })
    }

    /// Distinct persisted keys of `targets`, in order, with their entities.
    fn target_keys(
        &self,
        context: &LinkContext,
        targets: &[EntityRef],
    ) -> Result<Vec<(SqlValue, EntityRef)>> {
        let mut keys: Vec<(SqlValue, EntityRef)> = Vec::with_capacity(targets.len());
        for target in targets {
            self.check_target(target)?;
            let entity = target.borrow();
            let Some(key) = entity.primary_key_param()?.filter(|_| entity.exists()) else {
                return Err(ConsistencyError::UnsavedTarget {
                    table: context.table.to_owned(),
                    relation: self.name().to_owned(),
                }
                .into());
            };
            if !keys.iter().any(|(seen, _)| *seen == key) {
                keys.push((key, Rc::clone(target)));
            }
        }
        Ok(keys)
    }

    /// Inserts one link row per target.
    ///
    /// ```ignore
    /// let tags = dogs().relation("tags")?;
    /// tags.link(&db, &rex, &[good_boy.clone()])?;
    /// ```
    pub fn link(&self, db: &Db, owner: &EntityRef, targets: &[EntityRef]) -> Result<()> {
        self.link_with(db, owner, targets, &[])
    }

    /// Inserts link rows carrying extra link table `attributes`.
    pub fn link_with(
        &self,
        db: &Db,
        owner: &EntityRef,
        targets: &[EntityRef],
        attributes: &[(&'static str, Value)],
    ) -> Result<()> {
        let context = self.link_context(owner)?;
        let keys = self.target_keys(&context, targets)?;
        if keys.is_empty() {
            return Ok(());
        }

        let link = &context.link;
        let columns = [
            Sql::ident(link.owner_column.clone()),
            Sql::ident(link.target_column.clone()),
        ]
        .into_iter()
        .chain(attributes.iter().map(|(column, _)| Sql::ident(*column)));
        let rows = keys.iter().map(|(key, _)| {
            let values = [Sql::param(context.owner_key.clone()), Sql::param(key.clone())]
                .into_iter()
                .chain(attributes.iter().map(|(_, value)| Sql::param(value.to_param())));
            Sql::join(values, Token::COMMA).parens()
        });
        let statement = Sql::token(Token::INSERT)
            .push(Token::INTO)
            .append(Sql::ident(link.table.clone()))
            .append(Sql::join(columns, Token::COMMA).parens())
            .push(Token::VALUES)
            .append(Sql::join(rows, Token::COMMA))
            .build();

        self.write_links(db, &context, "link", &statement, keys.len() as u64)?;
        if context.loaded {
            let mut owner = owner.borrow_mut();
            if let Some(Loaded::Many(linked)) = owner.loaded_mut(self.name()) {
                for (_, target) in keys {
                    if !linked.iter().any(|existing| Rc::ptr_eq(existing, &target)) {
                        linked.push(target);
                    }
                }
            }
        }
        Ok(())
    }

    /// Deletes the link rows between `owner` and `targets`.
    pub fn unlink(&self, db: &Db, owner: &EntityRef, targets: &[EntityRef]) -> Result<()> {
        let context = self.link_context(owner)?;
        let keys = self.target_keys(&context, targets)?;
        if keys.is_empty() {
            return Ok(());
        }

        let link = &context.link;
        let statement = delete_from(link)
            .append(Sql::ident(link.owner_column.clone()))
            .push(Token::EQ)
            .append(Sql::param(context.owner_key.clone()))
            .push(Token::AND)
            .append(Sql::ident(link.target_column.clone()))
            .push(Token::IN)
            .append(Sql::param(SqlValue::List(keys.iter().map(|(key, _)| key.clone()).collect())).parens())
            .build();

        self.write_links(db, &context, "unlink", &statement, keys.len() as u64)?;
        if context.loaded {
            // A self relation may list the owner itself, so keys are read
            // before the owner is borrowed mutably
            let linked = match owner.borrow().relation(self.name()) {
                Some(Loaded::Many(linked)) => linked.clone(),
                _ => return Ok(()),
            };
            let primary = self.target().primary_index();
            let unlinked = keys.into_iter().map(|(key, _)| key).collect::<Vec<_>>();
            let mut retained = Vec::with_capacity(linked.len());
            for entity in linked {
                let key = entity.borrow().key_at(primary)?;
                if !key.is_some_and(|key| unlinked.contains(&key)) {
                    retained.push(entity);
                }
            }
            owner
                .borrow_mut()
                .set_loaded(self.name(), Loaded::Many(retained));
        }
        Ok(())
    }

    /// Deletes every link row of `owner` and returns how many were removed.
    pub fn clear(&self, db: &Db, owner: &EntityRef) -> Result<u64> {
        let context = self.link_context(owner)?;
        let link = &context.link;
        let statement = delete_from(link)
            .append(Sql::ident(link.owner_column.clone()))
            .push(Token::EQ)
            .append(Sql::param(context.owner_key.clone()))
            .build();
        let outcome = db.write(&statement)?;
        if context.loaded {
            owner
                .borrow_mut()
                .set_loaded(self.name(), Loaded::Many(Vec::new()));
        }
        Ok(outcome.affected_rows)
    }

    /// Replaces the links of `owner` with exactly `targets`.
    ///
    /// Runs as two statements, a clear and a link, without a transaction.
    pub fn sync(&self, db: &Db, owner: &EntityRef, targets: &[EntityRef]) -> Result<()> {
        // Validate before deleting anything
        let context = self.link_context(owner)?;
        self.target_keys(&context, targets)?;
        self.clear(db, owner)?;
        self.link(db, owner, targets)
    }

    fn write_links(
        &self,
        db: &Db,
        context: &LinkContext,
        operation: &'static str,
        statement: &Statement,
        expected: u64,
    ) -> Result<()> {
        let actual = db.write(statement)?.affected_rows;
        if actual == expected {
            return Ok(());
        }
        let mismatch = RelationError::LinkMismatch {
            link_table: context.link.table.to_string(),
            operation,
            expected,
            actual,
        };
        if context.loaded {
            return Err(mismatch.into());
        }
        tether_warn!(relation = self.name(), error = %mismatch, "link rows out of step");
        Ok(())
    }
}

fn delete_from(link: &ResolvedLink) -> Sql {
    Sql::token(Token::DELETE)
        .push(Token::FROM)
        .append(Sql::ident(link.table.clone()))
        .push(Token::WHERE)
}
