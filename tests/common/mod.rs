//! Shared schema, seed data and a query-counting storage for integration
//! tests.

#![cfg(feature = "rusqlite")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

use tether::prelude::*;
use tether::sqlite::SqliteStorage;
use tether::{
    AliasedRow, Config, ProjectedTable, Statement, Storage, VersionedCodec, WriteKind,
    WriteOutcome,
};

// =============================================================================
// Schema
// =============================================================================

pub static ANIMALS: LazyLock<EntityDef> = LazyLock::new(|| {
    EntityDef::builder("animals")
        .column(ColumnDef::id("id"))
        .column(ColumnDef::string("species"))
        .relation(Relation::has_many("dogs", dogs, "animal_id").order_by("name", OrderBy::Asc))
        .build()
        .expect("valid animals schema")
});

pub static OWNERS: LazyLock<EntityDef> = LazyLock::new(|| {
    EntityDef::builder("owners")
        .column(ColumnDef::id("id"))
        .column(ColumnDef::string("name"))
        .relation(Relation::has_many("dogs", dogs, "owner_id").order_by("name", OrderBy::Asc))
        .relation(Relation::has_one("license", licenses, "owner_id"))
        .build()
        .expect("valid owners schema")
});

pub static LICENSES: LazyLock<EntityDef> = LazyLock::new(|| {
    EntityDef::builder("licenses")
        .column(ColumnDef::id("id"))
        .column(ColumnDef::string("number"))
        .column(ColumnDef::integer("owner_id").nullable())
        .build()
        .expect("valid licenses schema")
});

pub static DOGS: LazyLock<EntityDef> = LazyLock::new(|| {
    EntityDef::builder("dogs")
        .column(ColumnDef::id("id"))
        .column(ColumnDef::string("name").transform(trim_name))
        .column(ColumnDef::integer("animal_id"))
        .column(ColumnDef::integer("owner_id").nullable())
        .column(ColumnDef::date("born").nullable())
        .column(
            ColumnDef::structured("meta")
                .nullable()
                .codec(Arc::new(VersionedCodec::new().migration(rename_weight))),
        )
        .column(ColumnDef::boolean("active").with_default())
        .column(ColumnDef::datetime("seen_at").nullable().skip_update())
        .relation(Relation::belongs_to("animal", animals, "animal_id"))
        .relation(Relation::belongs_to("owner", owners, "owner_id").optional())
        .relation(Relation::many_to_many("tags", tags).order_by("position", OrderBy::Asc))
        .build()
        .expect("valid dogs schema")
});

pub static TAGS: LazyLock<EntityDef> = LazyLock::new(|| {
    EntityDef::builder("tags")
        .column(ColumnDef::id("id"))
        .column(ColumnDef::string("label"))
        .relation(Relation::many_to_many("dogs", dogs))
        .build()
        .expect("valid tags schema")
});

/// Self-referencing many-to-many through `pals_pals(palsId, palsId2)`.
pub static PALS: LazyLock<EntityDef> = LazyLock::new(|| {
    EntityDef::builder("pals")
        .column(ColumnDef::id("id"))
        .column(ColumnDef::string("name"))
        .relation(Relation::many_to_many("friends", pals))
        .build()
        .expect("valid pals schema")
});

pub fn animals() -> &'static EntityDef {
    &ANIMALS
}

pub fn owners() -> &'static EntityDef {
    &OWNERS
}

pub fn licenses() -> &'static EntityDef {
    &LICENSES
}

pub fn dogs() -> &'static EntityDef {
    &DOGS
}

pub fn tags() -> &'static EntityDef {
    &TAGS
}

pub fn pals() -> &'static EntityDef {
    &PALS
}

fn trim_name(field: Field, _kind: WriteKind) -> Field {
    match field {
        Field::Value(Value::Text(name)) => Field::Value(Value::Text(name.trim().to_owned())),
        other => other,
    }
}

/// Version 1 of `dogs.meta` renamed `weight_lb` to `weight`.
fn rename_weight(mut payload: serde_json::Value) -> Result<serde_json::Value, String> {
    let object = payload.as_object_mut().ok_or("meta must be an object")?;
    if let Some(weight) = object.remove("weight_lb") {
        object.insert("weight".to_owned(), weight);
    }
    Ok(payload)
}

const DDL: &str = "
CREATE TABLE animals (id INTEGER PRIMARY KEY AUTOINCREMENT, species TEXT NOT NULL);
CREATE TABLE owners (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
CREATE TABLE licenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL,
    owner_id INTEGER
);
CREATE TABLE dogs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    animal_id INTEGER NOT NULL,
    owner_id INTEGER,
    born TEXT,
    meta TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    seen_at TEXT
);
CREATE TABLE tags (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL);
CREATE TABLE dogs_tags (
    dogsId INTEGER NOT NULL,
    tagsId INTEGER NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (dogsId, tagsId)
);
CREATE TABLE pals (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
CREATE TABLE pals_pals (
    palsId INTEGER NOT NULL,
    palsId2 INTEGER NOT NULL,
    PRIMARY KEY (palsId, palsId2)
);
";

const SEED: &str = "
INSERT INTO animals (id, species) VALUES (1, 'canis'), (2, 'vulpes');
INSERT INTO owners (id, name) VALUES (1, 'Ann'), (2, 'Bob'), (3, 'Cid');
INSERT INTO licenses (id, number, owner_id) VALUES (1, 'L-1', 1);
INSERT INTO dogs (id, name, animal_id, owner_id, born, meta) VALUES
    (1, 'Rex', 1, 1, '2019-04-01', '{\"weight_lb\": 30}'),
    (2, 'Max', 1, 1, NULL, '{\"v\": 1, \"data\": {\"weight\": 12}}'),
    (3, 'Fido', 2, 2, NULL, NULL),
    (4, 'Stray', 1, NULL, NULL, NULL);
INSERT INTO tags (id, label) VALUES (1, 'good'), (2, 'loud'), (3, 'small');
INSERT INTO dogs_tags (dogsId, tagsId, position) VALUES (1, 2, 0), (1, 1, 1), (2, 1, 0), (3, 3, 0);
";

// =============================================================================
// Counting storage
// =============================================================================

/// Forwards to SQLite and records every statement.
#[derive(Debug)]
pub struct CountingStorage {
    inner: SqliteStorage,
    reads: Cell<usize>,
    writes: Cell<usize>,
    log: RefCell<Vec<Statement>>,
}

impl CountingStorage {
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    /// Every statement since the last reset.
    pub fn log(&self) -> Vec<Statement> {
        self.log.borrow().clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.log.borrow().iter().map(|s| s.sql.clone()).collect()
    }

    pub fn reset(&self) {
        self.reads.set(0);
        self.writes.set(0);
        self.log.borrow_mut().clear();
    }

    pub fn execute_batch(&self, sql: &str) {
        self.inner
            .execute_batch(sql)
            .expect("batch should execute");
    }

    /// Reads a single integer through the raw connection.
    pub fn scalar(&self, sql: &str) -> i64 {
        self.inner
            .connection()
            .query_row(sql, [], |row| row.get(0))
            .expect("scalar query should return one row")
    }
}

impl Storage for CountingStorage {
    fn read(
        &self,
        statement: &Statement,
        projection: &[ProjectedTable],
    ) -> tether::Result<Vec<AliasedRow>> {
        self.reads.set(self.reads.get() + 1);
        self.log.borrow_mut().push(statement.clone());
        self.inner.read(statement, projection)
    }

    fn write(&self, statement: &Statement) -> tether::Result<WriteOutcome> {
        self.writes.set(self.writes.get() + 1);
        self.log.borrow_mut().push(statement.clone());
        self.inner.write(statement)
    }
}

// =============================================================================
// Setup
// =============================================================================

pub struct Fixture {
    pub db: Db,
    pub storage: Rc<CountingStorage>,
}

impl Fixture {
    pub fn find(&self, def: &'static EntityDef, id: i64) -> EntityRef {
        self.db
            .find(def, id)
            .expect("find should succeed")
            .expect("row should exist")
    }
}

/// Empty tables.
pub fn setup_empty() -> Fixture {
    setup_with(Config::default())
}

pub fn setup_with(config: Config) -> Fixture {
    let inner = SqliteStorage::open_in_memory().expect("in-memory database");
    inner.execute_batch(DDL).expect("schema should be created");
    let storage = Rc::new(CountingStorage {
        inner,
        reads: Cell::new(0),
        writes: Cell::new(0),
        log: RefCell::new(Vec::new()),
    });
    let db = Db::with_config(Rc::clone(&storage), config);
    Fixture { db, storage }
}

/// Seeded tables:
///
/// - animals: 1 canis, 2 vulpes
/// - owners: 1 Ann, 2 Bob, 3 Cid (no dogs)
/// - licenses: 1 L-1 (Ann)
/// - dogs: 1 Rex (canis, Ann), 2 Max (canis, Ann), 3 Fido (vulpes, Bob),
///   4 Stray (canis, no owner)
/// - tags: Rex [loud, good], Max [good], Fido [small]
pub fn setup_db() -> Fixture {
    let fixture = setup_empty();
    fixture.storage.execute_batch(SEED);
    fixture.storage.reset();
    fixture
}

pub fn names(entities: &[EntityRef]) -> Vec<String> {
    entities
        .iter()
        .map(|entity| {
            let entity = entity.borrow();
            entity
                .value("name")
                .or_else(|| entity.value("label"))
                .or_else(|| entity.value("species"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        })
        .collect()
}

pub fn id(entity: &EntityRef) -> i64 {
    entity
        .borrow()
        .primary_key()
        .value()
        .and_then(Value::as_i64)
        .expect("entity should have an integer key")
}
