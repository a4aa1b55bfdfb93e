use std::rc::Rc;

use super::{Keys, Relation, RelationKind, clear_slots, group_by};
use crate::db::Db;
use crate::entity::{EntityRef, Loaded};
use crate::error::Result;
use crate::filter::in_array;
use crate::query::{OrderBy, Query};
use crate::schema::EntityDef;

/// `(foreign key, sort, single-valued)`
type Shape = (&'static str, Option<(&'static str, OrderBy)>, bool);

fn shape(relation: &Relation) -> Result<Shape> {
    match relation.kind() {
        RelationKind::HasOne { foreign_key } => Ok((*foreign_key, None, true)),
        RelationKind::HasMany { foreign_key, order } => Ok((*foreign_key, *order, false)),
        _ => Err(relation.wrong_kind("a has-one or has-many relation")),
    }
}

/// One query for targets whose foreign key is any of the owners' primary
/// keys, grouped back onto each owner.
pub(super) fn load(
    relation: &Relation,
    db: &Db,
    owner: &'static EntityDef,
    owners: &[EntityRef],
) -> Result<Vec<EntityRef>> {
    let (foreign_key, order, single) = shape(relation)?;
    let target = relation.target();
    let fk_index = target.require_column(foreign_key)?;

    let keys = Keys::collect(owners, owner.primary_index())?;
    if keys.is_empty() {
        clear_slots(relation, owners);
        return Ok(Vec::new());
    }

    let mut query = Query::new(target).r#where(in_array(foreign_key, keys.values))?;
    if let Some((column, direction)) = order {
        query = query.order_by(column, direction);
    }
    let targets = relation.with_nested(query)?.fetch(db)?;

    let groups = group_by(&targets, fk_index)?;
    for owner in owners {
        let key = owner.borrow().primary_key_param()?;
        let matched = key.and_then(|key| groups.get(&key).cloned()).unwrap_or_default();
        let loaded = if single {
            Loaded::One(matched.into_iter().next())
        } else {
            Loaded::Many(matched)
        };
        owner.borrow_mut().set_loaded(relation.name(), loaded);
    }
    Ok(targets)
}

/// Points `target`'s foreign key at `owner` and stores it in the slot.
///
/// The previous target, if any, is left untouched in memory; saving it is
/// up to the caller.
pub(super) fn assign_one(
    relation: &Relation,
    foreign_key: &'static str,
    owner: &EntityRef,
    target: Option<&EntityRef>,
) -> Result<()> {
    if let Some(target) = target {
        let key = owner.borrow().primary_key().clone();
        let mut target = target.borrow_mut();
        let index = target.def().require_column(foreign_key)?;
        target.set_field_at(index, key);
    }
    owner
        .borrow_mut()
        .set_loaded(relation.name(), Loaded::One(target.map(Rc::clone)));
    Ok(())
}
