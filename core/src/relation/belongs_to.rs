use std::rc::Rc;

use hashbrown::HashMap;

use super::{Keys, Relation, RelationKind};
use crate::db::Db;
use crate::entity::{Entity, EntityRef, Loaded};
use crate::error::{RelationError, Result};
use crate::filter::{Selector, eq_columns, in_array};
use crate::join::{JoinNode, JoinType};
use crate::query::Query;
use crate::schema::EntityDef;
use crate::value::{Field, SqlValue};

fn foreign_key_of(relation: &Relation) -> Result<(&'static str, bool)> {
    match relation.kind() {
        RelationKind::BelongsTo {
            foreign_key,
            optional,
        } => Ok((*foreign_key, *optional)),
        _ => Err(relation.wrong_kind("a belongs-to relation")),
    }
}

/// Joins the target under the relation's name and resolves it from the
/// joined columns after the fetch.
pub(super) fn apply(relation: Relation, query: Query) -> Result<Query> {
    let (foreign_key, optional) = foreign_key_of(&relation)?;
    let owner = query.def();
    let fk_index = owner.require_column(foreign_key)?;
    let alias = relation.name();
    let query = query.require_column(foreign_key);

    // A second join under the same alias would be ambiguous
    if query.has_join(alias) {
        return Ok(relation.apply_batched(query));
    }

    let target = relation.target();
    let on = eq_columns(
        Selector::new(target.primary().name()).of(alias),
        Selector::new(foreign_key).of(query.alias().to_owned()),
    );
    let kind = if optional {
        JoinType::Left
    } else {
        JoinType::Inner
    };
    let query = query.join_node(JoinNode::new(kind, target, alias, on));

    Ok(query.hook(move |db, owners, rows| {
        let primary = target.primary().name();
        let mut distinct: Vec<EntityRef> = Vec::new();
        let mut by_key: HashMap<SqlValue, EntityRef> = HashMap::new();
        let mut resolved = Vec::with_capacity(owners.len());

        for row in rows {
            let Some(joined) = row.get(alias) else {
                resolved.push(None);
                continue;
            };
            let Some(key) = joined.get(primary).filter(|key| !key.is_null()) else {
                resolved.push(None);
                continue;
            };
            let entity = match by_key.get(key) {
                Some(entity) => Rc::clone(entity),
                None => {
                    let entity = Entity::from_row(target, joined)?.into_ref();
                    by_key.insert(key.clone(), Rc::clone(&entity));
                    distinct.push(Rc::clone(&entity));
                    entity
                }
            };
            resolved.push(Some(entity));
        }

        for (owner, target_entity) in owners.iter().zip(&resolved) {
            if target_entity.is_none() && !optional {
                return Err(missing_target(&relation, owner, fk_index)?);
            }
        }
        for nested in relation.nested() {
            nested.load(db, &distinct)?;
        }
        for (owner, target_entity) in owners.iter().zip(resolved) {
            owner
                .borrow_mut()
                .set_loaded(relation.name(), Loaded::One(target_entity));
        }
        Ok(())
    }))
}

/// One query for every distinct foreign key among `owners`.
pub(super) fn load(
    relation: &Relation,
    db: &Db,
    owner: &'static EntityDef,
    owners: &[EntityRef],
) -> Result<Vec<EntityRef>> {
    let (foreign_key, optional) = foreign_key_of(relation)?;
    let fk_index = owner.require_column(foreign_key)?;
    let target = relation.target();

    let keys = Keys::collect(owners, fk_index)?;
    let targets = if keys.is_empty() {
        Vec::new()
    } else {
        let query = Query::new(target).r#where(in_array(target.primary().name(), keys.values))?;
        relation.with_nested(query)?.fetch(db)?
    };

    let mut by_key: HashMap<SqlValue, EntityRef> = HashMap::with_capacity(targets.len());
    for entity in &targets {
        if let Some(key) = entity.borrow().primary_key_param()? {
            by_key.entry(key).or_insert_with(|| Rc::clone(entity));
        }
    }

    let mut resolved = Vec::with_capacity(owners.len());
    for owner in owners {
        let key = owner.borrow().key_at(fk_index)?;
        match key.and_then(|key| by_key.get(&key)) {
            Some(entity) => resolved.push(Some(Rc::clone(entity))),
            None if optional => resolved.push(None),
            None => return Err(missing_target(relation, owner, fk_index)?),
        }
    }
    for (owner, target_entity) in owners.iter().zip(resolved) {
        owner
            .borrow_mut()
            .set_loaded(relation.name(), Loaded::One(target_entity));
    }
    Ok(targets)
}

/// Stores `target` in the slot and copies its primary key into the foreign
/// key column.
pub(super) fn assign(
    relation: &Relation,
    foreign_key: &'static str,
    owner: &EntityRef,
    target: Option<&EntityRef>,
) -> Result<()> {
    let field = match target {
        Some(target) => target.borrow().primary_key().clone(),
        None => Field::Null,
    };
    let mut owner = owner.borrow_mut();
    let index = owner.def().require_column(foreign_key)?;
    owner.set_field_at(index, field);
    owner.set_loaded(relation.name(), Loaded::One(target.cloned()));
    Ok(())
}

fn missing_target(
    relation: &Relation,
    owner: &EntityRef,
    fk_index: usize,
) -> Result<crate::error::TetherError> {
    let owner = owner.borrow();
    let key = owner
        .key_at(fk_index)?
        .map_or_else(|| "NULL".to_owned(), |key| key.to_string());
    Ok(RelationError::MissingTarget {
        source_table: owner.table().to_owned(),
        target: relation.target().table().to_owned(),
        key,
    }
    .into())
}
