//! Entity and column declarations.
//!
//! Definitions are built once and shared as `&'static EntityDef`, usually
//! from a `LazyLock`. Relations point at their target through a function so
//! entities can reference each other cyclically:
//!
//! ```ignore
//! static DOGS: LazyLock<EntityDef> = LazyLock::new(|| {
//!     EntityDef::builder("dogs")
//!         .column(ColumnDef::id("id"))
//!         .column(ColumnDef::integer("animal_id"))
//!         .relation(Relation::belongs_to("animal", animals, "animal_id"))
//!         .build()
//!         .expect("valid dogs schema")
//! });
//! fn dogs() -> &'static EntityDef { &DOGS }
//! ```

mod column;

pub use column::*;

use compact_str::CompactString;

use crate::error::{Result, UsageError};
use crate::relation::Relation;

/// Resolves an entity definition lazily.
pub type DefFn = fn() -> &'static EntityDef;

/// Mapping between an entity and its table.
#[derive(Debug)]
pub struct EntityDef {
    table: &'static str,
    columns: Vec<ColumnDef>,
    primary: usize,
    relations: Vec<Relation>,
}

impl EntityDef {
    pub fn builder(table: &'static str) -> EntityDefBuilder {
        EntityDefBuilder {
            table,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    #[inline]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    #[inline]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    #[inline]
    pub fn primary(&self) -> &ColumnDef {
        &self.columns[self.primary]
    }

    #[inline]
    pub const fn primary_index(&self) -> usize {
        self.primary
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Like [`Self::column_index`] but reports unknown names as usage errors.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            UsageError::UnknownColumn {
                table: self.table.to_owned(),
                column: name.to_owned(),
            }
            .into()
        })
    }

    #[inline]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Looks up a declared relation by name.
    pub fn relation(&self, name: &str) -> Result<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| {
                UsageError::UnknownRelation {
                    table: self.table.to_owned(),
                    relation: name.to_owned(),
                }
                .into()
            })
    }

    /// Definitions are singletons; identity is address equality.
    #[inline]
    pub fn is(&self, other: &EntityDef) -> bool {
        core::ptr::eq(self, other)
    }
}

/// Builder returned by [`EntityDef::builder`].
#[derive(Debug)]
pub struct EntityDefBuilder {
    table: &'static str,
    columns: Vec<ColumnDef>,
    relations: Vec<Relation>,
}

impl EntityDefBuilder {
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validates the declaration: a table name, exactly one primary column
    /// and unique column and relation names.
    pub fn build(self) -> Result<EntityDef> {
        if self.table.is_empty() {
            return Err(UsageError::MissingTable.into());
        }

        let mut seen: Vec<CompactString> = Vec::with_capacity(self.columns.len());
        let mut primary: Option<usize> = None;
        for (i, column) in self.columns.iter().enumerate() {
            if seen.iter().any(|name| name == column.name()) {
                return Err(UsageError::DuplicateColumn {
                    table: self.table.to_owned(),
                    column: column.name().to_owned(),
                }
                .into());
            }
            seen.push(CompactString::const_new(column.name()));

            if column.is_primary() {
                if let Some(first) = primary {
                    return Err(UsageError::DuplicatePrimary {
                        table: self.table.to_owned(),
                        first: self.columns[first].name().to_owned(),
                        second: column.name().to_owned(),
                    }
                    .into());
                }
                primary = Some(i);
            }
        }
        let Some(primary) = primary else {
            return Err(UsageError::MissingPrimary {
                table: self.table.to_owned(),
            }
            .into());
        };

        for (i, relation) in self.relations.iter().enumerate() {
            if self.relations[..i].iter().any(|r| r.name() == relation.name()) {
                return Err(UsageError::DuplicateRelation {
                    table: self.table.to_owned(),
                    relation: relation.name().to_owned(),
                }
                .into());
            }
        }

        Ok(EntityDef {
            table: self.table,
            columns: self.columns,
            primary,
            relations: self.relations,
        })
    }
}
