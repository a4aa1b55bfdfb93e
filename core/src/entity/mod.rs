//! Entity instances and change tracking.
//!
//! An [`Entity`] holds one [`Field`] per declared column plus a snapshot of
//! the encoded values last known to be in storage. Saving writes only the
//! columns whose encoding differs from the snapshot.

mod persist;

pub(crate) use persist::{delete, save};

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};

use crate::codec::{self, decode, encode};
use crate::error::{ConsistencyError, Result};
use crate::schema::{EntityDef, WriteKind};
use crate::storage::Row;
use crate::value::{Field, SqlValue, Value};

/// Shared handle to an entity. Relation slots and query results hold the
/// same instance, so assignments made through one handle are visible through
/// every other.
pub type EntityRef = Rc<RefCell<Entity>>;

/// Contents of a loaded relation slot.
#[derive(Debug, Clone)]
pub enum Loaded {
    One(Option<EntityRef>),
    Many(Vec<EntityRef>),
}

impl Loaded {
    /// All entities in the slot.
    pub fn entities(&self) -> Vec<EntityRef> {
        match self {
            Loaded::One(one) => one.iter().cloned().collect(),
            Loaded::Many(many) => many.clone(),
        }
    }
}

/// Whether an entity has a stored counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Created in memory or deleted
    Transient,
    Persisted,
}

/// Result of [`crate::Db::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated(Vec<&'static str>),
    /// Nothing needed writing
    NoOp,
}

/// Columns a save would write, with their encoded values.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ChangeSet {
    pub(crate) writes: Vec<(usize, SqlValue)>,
}

impl ChangeSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[derive(Clone)]
pub struct Entity {
    def: &'static EntityDef,
    fields: Vec<Field>,
    snapshot: Vec<Option<SqlValue>>,
    exists: bool,
    forced: HashSet<usize>,
    relations: HashMap<CompactString, Loaded>,
}

impl Entity {
    /// A transient instance with every column absent.
    pub fn new(def: &'static EntityDef) -> Self {
        let width = def.columns().len();
        Self {
            def,
            fields: vec![Field::Absent; width],
            snapshot: vec![None; width],
            exists: false,
            forced: HashSet::new(),
            relations: HashMap::new(),
        }
    }

    /// Builds a transient instance from `(column, value)` pairs.
    pub fn with_values<I, V>(def: &'static EntityDef, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<Value>,
    {
        let mut entity = Self::new(def);
        for (column, value) in values {
            entity.set(column, value)?;
        }
        Ok(entity)
    }

    /// Materializes a fetched row. Columns missing from the row stay absent.
    ///
    /// The snapshot holds the canonical re-encoding of each decoded cell, so
    /// a fetched entity compares as unchanged even when the stored text is
    /// not byte-identical to what the codec would write.
    pub fn from_row(def: &'static EntityDef, row: &Row) -> Result<Self> {
        let mut entity = Self::new(def);
        for (i, column) in def.columns().iter().enumerate() {
            let Some(raw) = row.get(column.name()) else {
                continue;
            };
            let field = decode(column, raw)?;
            entity.snapshot[i] = encode(column, &field)?;
            entity.fields[i] = field;
        }
        entity.exists = true;
        Ok(entity)
    }

    #[inline]
    pub fn into_ref(self) -> EntityRef {
        Rc::new(RefCell::new(self))
    }

    #[inline]
    pub const fn def(&self) -> &'static EntityDef {
        self.def
    }

    #[inline]
    pub const fn table(&self) -> &'static str {
        self.def.table()
    }

    /// Whether the entity is known to exist in storage.
    #[inline]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    pub const fn state(&self) -> EntityState {
        if self.exists {
            EntityState::Persisted
        } else {
            EntityState::Transient
        }
    }

    pub fn get(&self, column: &str) -> Result<&Field> {
        let index = self.def.require_column(column)?;
        Ok(&self.fields[index])
    }

    /// The value of `column`, `None` when absent, null or undeclared.
    pub fn value(&self, column: &str) -> Option<&Value> {
        let index = self.def.column_index(column)?;
        self.fields[index].value()
    }

    /// Reads a structured column into a typed value.
    pub fn structured<T: serde::de::DeserializeOwned>(&self, column: &str) -> Result<Option<T>> {
        match self.get(column)? {
            Field::Value(value) => codec::from_structured(value).map(Some),
            _ => Ok(None),
        }
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.def.require_column(column)?;
        self.fields[index] = Field::from(value.into());
        Ok(())
    }

    pub fn set_null(&mut self, column: &str) -> Result<()> {
        let index = self.def.require_column(column)?;
        self.fields[index] = Field::Null;
        Ok(())
    }

    /// Marks `column` as never fetched or assigned.
    pub fn unset(&mut self, column: &str) -> Result<()> {
        let index = self.def.require_column(column)?;
        self.fields[index] = Field::Absent;
        Ok(())
    }

    /// Writes `column` on the next save even if it looks unchanged.
    pub fn force_save(&mut self, column: &str) -> Result<()> {
        let index = self.def.require_column(column)?;
        self.forced.insert(index);
        Ok(())
    }

    #[inline]
    pub fn primary_key(&self) -> &Field {
        &self.fields[self.def.primary_index()]
    }

    /// Encoded, non-null value of the column at `index`.
    pub(crate) fn key_at(&self, index: usize) -> Result<Option<SqlValue>> {
        let column = &self.def.columns()[index];
        Ok(encode(column, &self.fields[index])?.filter(|v| !v.is_null()))
    }

    /// Encoded, non-null primary key.
    pub(crate) fn primary_key_param(&self) -> Result<Option<SqlValue>> {
        self.key_at(self.def.primary_index())
    }

    /// The key the stored row is addressed by. A persisted entity whose
    /// primary key was reassigned in memory still updates its original row.
    pub(crate) fn stored_key(&self) -> Result<Option<SqlValue>> {
        match &self.snapshot[self.def.primary_index()] {
            Some(value) if !value.is_null() => Ok(Some(value.clone())),
            _ => self.primary_key_param(),
        }
    }

    pub(crate) fn field_at(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    pub(crate) fn set_field_at(&mut self, index: usize, field: Field) {
        self.fields[index] = field;
    }

    // ==================== relations ====================

    pub fn is_loaded(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Whether `relation` is loaded and holds at least one entity.
    pub fn is_set(&self, relation: &str) -> bool {
        match self.relations.get(relation) {
            Some(Loaded::One(one)) => one.is_some(),
            Some(Loaded::Many(many)) => !many.is_empty(),
            None => false,
        }
    }

    pub fn relation(&self, relation: &str) -> Option<&Loaded> {
        self.relations.get(relation)
    }

    /// The loaded single-valued relation `relation`.
    ///
    /// `None` when the slot was never loaded, `Some(None)` when it was loaded
    /// and empty.
    pub fn one(&self, relation: &str) -> Option<Option<EntityRef>> {
        match self.relations.get(relation)? {
            Loaded::One(one) => Some(one.clone()),
            Loaded::Many(_) => None,
        }
    }

    /// The loaded collection relation `relation`.
    pub fn many(&self, relation: &str) -> Option<&[EntityRef]> {
        match self.relations.get(relation)? {
            Loaded::Many(many) => Some(many),
            Loaded::One(_) => None,
        }
    }

    pub(crate) fn set_loaded(&mut self, relation: &str, loaded: Loaded) {
        self.relations.insert(CompactString::from(relation), loaded);
    }

    pub(crate) fn loaded_mut(&mut self, relation: &str) -> Option<&mut Loaded> {
        self.relations.get_mut(relation)
    }

    // ==================== change tracking ====================

    /// Names of the columns the next save would write.
    ///
    /// Pure: calling it repeatedly without intervening mutation yields the
    /// same list.
    pub fn changed_fields(&self) -> Result<Vec<&'static str>> {
        let changes = self.changes()?;
        Ok(changes
            .writes
            .iter()
            .map(|(i, _)| self.def.columns()[*i].name())
            .collect())
    }

    /// Columns to write with their encoded values.
    ///
    /// A transient entity writes every present column; absent columns must
    /// be nullable or defaulted. A persisted entity writes columns whose
    /// encoding differs from the snapshot, plus forced ones. Auto-increment
    /// columns are never written.
    pub(crate) fn changes(&self) -> Result<ChangeSet> {
        let mut changes = ChangeSet::default();
        for (i, column) in self.def.columns().iter().enumerate() {
            if column.is_auto_increment() {
                continue;
            }
            let Some(encoded) = encode(column, &self.fields[i])? else {
                if !self.exists && !column.is_optional_on_insert() {
                    return Err(ConsistencyError::MissingColumn {
                        table: self.table().to_owned(),
                        column: column.name().to_owned(),
                    }
                    .into());
                }
                continue;
            };
            let changed = !self.exists
                || self.forced.contains(&i)
                || self.snapshot[i].as_ref() != Some(&encoded);
            if !changed {
                continue;
            }
            if encoded.is_null() && !column.is_nullable() {
                return Err(ConsistencyError::NullColumn {
                    table: self.table().to_owned(),
                    column: column.name().to_owned(),
                }
                .into());
            }
            changes.writes.push((i, encoded));
        }
        Ok(changes)
    }

    /// Runs column save transforms in place.
    pub(crate) fn apply_transforms(&mut self, kind: WriteKind) {
        for (i, column) in self.def.columns().iter().enumerate() {
            if let Some(transform) = column.save_transform() {
                let field = core::mem::take(&mut self.fields[i]);
                self.fields[i] = transform(field, kind);
            }
        }
    }

    /// Decoded snapshot value of the column at `index`.
    pub(crate) fn previous_at(&self, index: usize) -> Result<Field> {
        match &self.snapshot[index] {
            Some(raw) => decode(&self.def.columns()[index], raw),
            None => Ok(Field::Absent),
        }
    }

    /// Records a completed write.
    pub(crate) fn mark_written(&mut self, writes: &[(usize, SqlValue)]) {
        for (i, value) in writes {
            self.snapshot[*i] = Some(value.clone());
        }
        self.forced.clear();
        self.exists = true;
    }

    /// Stores a generated primary key after an insert.
    pub(crate) fn assign_generated_key(&mut self, id: i64) {
        let index = self.def.primary_index();
        self.fields[index] = Field::Value(Value::Integer(id));
        self.snapshot[index] = Some(SqlValue::Integer(id));
    }

    /// Forgets storage state after a delete.
    pub(crate) fn mark_deleted(&mut self) {
        self.exists = false;
        self.snapshot.iter_mut().for_each(|s| *s = None);
        self.forced.clear();
        if self.def.primary().is_auto_increment() {
            self.fields[self.def.primary_index()] = Field::Absent;
        }
    }
}

impl fmt::Debug for Entity {
    // Relation slots may point back at this entity, so only their names are
    // printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.def.table());
        for (column, field) in self.def.columns().iter().zip(&self.fields) {
            if field.is_present() {
                s.field(column.name(), field);
            }
        }
        s.field("exists", &self.exists);
        let mut loaded = self.relations.keys().map(CompactString::as_str).collect::<Vec<_>>();
        loaded.sort_unstable();
        s.field("loaded", &loaded);
        s.finish()
    }
}
