use crate::db::Db;
use crate::error::{ConsistencyError, Result};
use crate::events::{LifecycleEvent, UpdatedEvent};
use crate::relation::RelationKind;
use crate::schema::WriteKind;
use crate::sql::{Sql, SqlChunk, Token};
use crate::value::{Field, SqlValue};
use crate::tether_trace_entity;

use super::{ChangeSet, Entity, EntityRef, Loaded, SaveOutcome};

/// Inserts or updates `entity`.
///
/// Loaded belongs-to relations must agree with their foreign key columns
/// before anything is written. After a successful write the snapshot holds
/// exactly what was written and foreign keys are copied back from the
/// related entities.
pub(crate) fn save(db: &Db, entity: &EntityRef) -> Result<SaveOutcome> {
    check_relations(&entity.borrow())?;
    check_primary_key(&entity.borrow())?;

    let kind = if entity.borrow().exists() {
        WriteKind::Update
    } else {
        WriteKind::Insert
    };
    entity.borrow_mut().apply_transforms(kind);

    let (changes, previous) = {
        let current = entity.borrow();
        let changes = current.changes()?;
        if changes.is_empty() || (kind == WriteKind::Update && only_skip_update(&current, &changes)) {
            return Ok(SaveOutcome::NoOp);
        }
        let previous = match kind {
            WriteKind::Insert => Vec::new(),
            WriteKind::Update => changes
                .writes
                .iter()
                .map(|(i, _)| current.previous_at(*i))
                .collect::<Result<Vec<_>>>()?,
        };
        (changes, previous)
    };

    let (statement, table) = {
        let current = entity.borrow();
        let statement = match kind {
            WriteKind::Insert => insert_statement(&current, &changes),
            WriteKind::Update => update_statement(&current, &changes)?,
        };
        (statement, current.table())
    };
    let outcome = db.write(&statement.build())?;
    db.check_affected(outcome.affected_rows, || match kind {
        WriteKind::Insert => format!("insert into `{table}`"),
        WriteKind::Update => format!("update of `{table}`"),
    })?;

    {
        let mut current = entity.borrow_mut();
        if kind == WriteKind::Insert
            && current.def().primary().is_auto_increment()
            && let Some(id) = outcome.insert_id
        {
            current.assign_generated_key(id);
        }
        current.mark_written(&changes.writes);
    }
    resync_foreign_keys(entity)?;

    let changed = {
        let current = entity.borrow();
        changes
            .writes
            .iter()
            .map(|(i, _)| current.def().columns()[*i].name())
            .collect::<Vec<_>>()
    };
    match kind {
        WriteKind::Insert => {
            tether_trace_entity!("insert", table);
            db.events().publish(&LifecycleEvent::Created(entity.clone()));
            Ok(SaveOutcome::Inserted)
        }
        WriteKind::Update => {
            tether_trace_entity!("update", table);
            let event = UpdatedEvent::new(entity.clone(), changed.clone(), previous);
            db.events().publish(&LifecycleEvent::Updated(event));
            Ok(SaveOutcome::Updated(changed))
        }
    }
}

/// Deletes the stored row of `entity` and resets it to transient.
pub(crate) fn delete(db: &Db, entity: &EntityRef) -> Result<()> {
    let (statement, table) = {
        let current = entity.borrow();
        if !current.exists() {
            return Err(ConsistencyError::NotPersisted {
                table: current.table().to_owned(),
            }
            .into());
        }
        let key = match current.primary_key_param()? {
            Some(_) => current.stored_key()?,
            None => None,
        };
        let Some(key) = key else {
            return Err(ConsistencyError::MissingPrimaryKey {
                table: current.table().to_owned(),
            }
            .into());
        };
        let statement = Sql::token(Token::DELETE)
            .push(Token::FROM)
            .append(Sql::ident(current.table()))
            .append(where_primary(&current, key));
        (statement, current.table())
    };

    let outcome = db.write(&statement.build())?;
    db.check_affected(outcome.affected_rows, || format!("delete from `{table}`"))?;

    entity.borrow_mut().mark_deleted();
    tether_trace_entity!("delete", table);
    db.events().publish(&LifecycleEvent::Deleted(entity.clone()));
    Ok(())
}

fn check_relations(entity: &Entity) -> Result<()> {
    for relation in entity.def().relations() {
        let RelationKind::BelongsTo { foreign_key, .. } = relation.kind() else {
            continue;
        };
        let Some(Loaded::One(target)) = entity.relation(relation.name()) else {
            continue;
        };
        let index = entity.def().require_column(foreign_key)?;
        let modified = || ConsistencyError::ForeignKeyModified {
            table: entity.table().to_owned(),
            column: (*foreign_key).to_owned(),
            relation: relation.name().to_owned(),
        };
        match target {
            Some(target) => {
                let target = target.borrow();
                if !target.exists() {
                    return Err(ConsistencyError::UnsavedTarget {
                        table: entity.table().to_owned(),
                        relation: relation.name().to_owned(),
                    }
                    .into());
                }
                if target.primary_key_param()? != entity.key_at(index)? {
                    return Err(modified().into());
                }
            }
            None => {
                if matches!(entity.field_at(index), Field::Value(_)) {
                    return Err(modified().into());
                }
            }
        }
    }
    Ok(())
}

fn check_primary_key(entity: &Entity) -> Result<()> {
    let primary = entity.def().primary();
    let present = !matches!(entity.primary_key(), Field::Absent | Field::Null);
    if !entity.exists() && present && primary.is_auto_increment() {
        return Err(ConsistencyError::ManualAutoIncrement {
            table: entity.table().to_owned(),
            column: primary.name().to_owned(),
        }
        .into());
    }
    // The in-memory key decides; the stored key only addresses the row
    if entity.exists() && entity.primary_key_param()?.is_none() {
        return Err(ConsistencyError::MissingPrimaryKey {
            table: entity.table().to_owned(),
        }
        .into());
    }
    Ok(())
}

/// Whether every write is a skip-update column nobody forced.
fn only_skip_update(entity: &Entity, changes: &ChangeSet) -> bool {
    let columns = entity.def().columns();
    changes
        .writes
        .iter()
        .all(|(i, _)| columns[*i].is_skip_update() && !entity.forced.contains(i))
}

fn insert_statement(entity: &Entity, changes: &ChangeSet) -> Sql {
    let columns = entity.def().columns();
    let names = Sql::join(
        changes
            .writes
            .iter()
            .map(|(i, _)| Sql::ident(columns[*i].name())),
        Token::COMMA,
    );
    let values = Sql::join(
        changes
            .writes
            .iter()
            .map(|(_, value)| Sql::param(value.clone())),
        Token::COMMA,
    );
    Sql::token(Token::INSERT)
        .push(Token::INTO)
        .append(Sql::ident(entity.table()))
        .append(names.parens())
        .push(Token::VALUES)
        .append(values.parens())
}

fn update_statement(entity: &Entity, changes: &ChangeSet) -> Result<Sql> {
    let columns = entity.def().columns();
    let assignments = Sql::join(
        changes.writes.iter().map(|(i, value)| {
            Sql::ident(columns[*i].name())
                .push(Token::EQ)
                .append(Sql::param(value.clone()))
        }),
        Token::COMMA,
    );
    let Some(key) = entity.stored_key()? else {
        return Err(ConsistencyError::MissingPrimaryKey {
            table: entity.table().to_owned(),
        }
        .into());
    };
    Ok(Sql::token(Token::UPDATE)
        .append(Sql::ident(entity.table()))
        .push(Token::SET)
        .append(assignments)
        .append(where_primary(entity, key)))
}

fn where_primary(entity: &Entity, key: SqlValue) -> Sql {
    Sql::token(Token::WHERE)
        .push(SqlChunk::ident_static(entity.def().primary().name()))
        .push(Token::EQ)
        .push(SqlChunk::Param(key))
}

/// Copies target primary keys into foreign key columns of loaded
/// belongs-to relations.
fn resync_foreign_keys(entity: &EntityRef) -> Result<()> {
    let updates = {
        let current = entity.borrow();
        let mut updates = Vec::new();
        for relation in current.def().relations() {
            let RelationKind::BelongsTo { foreign_key, .. } = relation.kind() else {
                continue;
            };
            let Some(Loaded::One(target)) = current.relation(relation.name()) else {
                continue;
            };
            let index = current.def().require_column(foreign_key)?;
            let Some(target) = target else {
                continue;
            };
            let field = target.borrow().primary_key().clone();
            if current.field_at(index) != &field {
                updates.push((index, field));
            }
        }
        updates
    };
    let mut current = entity.borrow_mut();
    for (index, field) in updates {
        current.set_field_at(index, field);
    }
    Ok(())
}
