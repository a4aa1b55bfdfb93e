use std::rc::Rc;

use crate::common::*;
use tether::error::RelationError;
use tether::prelude::*;
use tether::{Loaded, TetherError};

fn by_id(fixture: &Fixture, relation: &'static str) -> Vec<EntityRef> {
    Query::new(dogs())
        .with(relation)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap()
}

fn one(entity: &EntityRef, relation: &str) -> Option<EntityRef> {
    entity
        .borrow()
        .one(relation)
        .expect("relation should be loaded")
}

fn many(entity: &EntityRef, relation: &str) -> Vec<EntityRef> {
    entity
        .borrow()
        .many(relation)
        .expect("relation should be loaded")
        .to_vec()
}

// =============================================================================
// Belongs-to
// =============================================================================

#[test]
fn belongs_to_loads_through_a_join() {
    let fixture = setup_db();
    let found = by_id(&fixture, "animal");
    assert_eq!(fixture.storage.reads(), 1);
    assert!(
        fixture.storage.log()[0]
            .sql
            .contains("INNER JOIN `animals` AS `animal` ON `animal`.`id` = `dogs`.`animal_id`")
    );

    let species = found
        .iter()
        .map(|dog| one(dog, "animal").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names(&species), vec!["canis", "canis", "vulpes", "canis"]);

    // One instance per distinct target
    assert!(Rc::ptr_eq(&species[0], &species[1]));
    assert!(Rc::ptr_eq(&species[0], &species[3]));
}

#[test]
fn optional_belongs_to_uses_left_join() {
    let fixture = setup_db();
    let found = by_id(&fixture, "owner");
    assert_eq!(found.len(), 4);
    assert!(fixture.storage.log()[0].sql.contains("LEFT JOIN `owners` AS `owner`"));

    let stray = &found[3];
    assert!(stray.borrow().is_loaded("owner"));
    assert!(!stray.borrow().is_set("owner"));
    assert!(one(stray, "owner").is_none());
    assert_eq!(names(&[one(&found[2], "owner").unwrap()]), vec!["Bob"]);
}

#[test]
fn required_target_missing() {
    let fixture = setup_db();
    fixture
        .storage
        .execute_batch("INSERT INTO dogs (id, name, animal_id) VALUES (5, 'Ghost', 99)");

    // The inner join drops the row
    assert_eq!(by_id(&fixture, "animal").len(), 4);

    // Batch loading reports it
    let found = Query::new(dogs()).fetch(&fixture.db).unwrap();
    let err = dogs()
        .relation("animal")
        .unwrap()
        .load(&fixture.db, &found)
        .unwrap_err();
    match err {
        TetherError::Relation(RelationError::MissingTarget {
            source_table,
            target,
            key,
        }) => {
            assert_eq!(source_table, "dogs");
            assert_eq!(target, "animals");
            assert_eq!(key, "99");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn batch_load_uses_one_query_for_distinct_keys() {
    let fixture = setup_db();
    let found = Query::new(dogs()).fetch(&fixture.db).unwrap();
    fixture.storage.reset();

    let animals = dogs()
        .relation("animal")
        .unwrap()
        .load(&fixture.db, &found)
        .unwrap();
    assert_eq!(animals.len(), 2);
    assert_eq!(fixture.storage.reads(), 1);

    let statement = &fixture.storage.log()[0];
    assert_eq!(statement.params.len(), 1);
    let tether::SqlValue::List(keys) = &statement.params[0] else {
        panic!("expected a list parameter");
    };
    assert_eq!(keys.len(), 2);
}

#[test]
fn duplicate_join_alias_falls_back_to_batch_loading() {
    let fixture = setup_db();
    let found = Query::new(dogs())
        .with("animal")
        .unwrap()
        .with("animal")
        .unwrap()
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(found.len(), 4);
    assert_eq!(fixture.storage.reads(), 2);
    assert!(found.iter().all(|dog| dog.borrow().is_set("animal")));
}

// =============================================================================
// Has-one / has-many
// =============================================================================

#[test]
fn has_many_groups_targets_by_owner() {
    let fixture = setup_db();
    let owners = Query::new(owners())
        .with("dogs")
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(fixture.storage.reads(), 2);

    assert_eq!(names(&many(&owners[0], "dogs")), vec!["Max", "Rex"]);
    assert_eq!(names(&many(&owners[1], "dogs")), vec!["Fido"]);

    // Loaded but empty
    assert!(owners[2].borrow().is_loaded("dogs"));
    assert!(many(&owners[2], "dogs").is_empty());
}

#[test]
fn has_one_takes_a_single_target() {
    let fixture = setup_db();
    let owners = Query::new(owners())
        .with("license")
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(fixture.storage.reads(), 2);

    let license = one(&owners[0], "license").unwrap();
    assert_eq!(license.borrow().value("number"), Some(&Value::from("L-1")));
    assert!(one(&owners[1], "license").is_none());
}

#[test]
fn no_owners_means_no_relation_queries() {
    let fixture = setup_db();
    let owners = Query::new(owners())
        .r#where(eq("name", "Nobody"))
        .unwrap()
        .with("dogs")
        .unwrap()
        .with("license")
        .unwrap()
        .fetch(&fixture.db)
        .unwrap();
    assert!(owners.is_empty());
    assert_eq!(fixture.storage.reads(), 1);
}

#[test]
fn keyless_owners_get_empty_slots_without_a_query() {
    let fixture = setup_db();
    let owner = Entity::with_values(owners(), [("name", "Dee")])
        .unwrap()
        .into_ref();
    let loaded = owners()
        .relation("dogs")
        .unwrap()
        .load(&fixture.db, std::slice::from_ref(&owner))
        .unwrap();
    assert!(loaded.is_empty());
    assert_eq!(fixture.storage.reads(), 0);
    assert!(matches!(
        owner.borrow().relation("dogs"),
        Some(Loaded::Many(dogs)) if dogs.is_empty()
    ));
}

// =============================================================================
// Many-to-many
// =============================================================================

#[test]
fn many_to_many_follows_link_order() {
    let fixture = setup_db();
    let found = by_id(&fixture, "tags");
    assert_eq!(fixture.storage.reads(), 2);

    assert_eq!(names(&many(&found[0], "tags")), vec!["loud", "good"]);
    assert_eq!(names(&many(&found[1], "tags")), vec!["good"]);
    assert_eq!(names(&many(&found[2], "tags")), vec!["small"]);
    assert!(many(&found[3], "tags").is_empty());

    // Targets linked to several owners are shared
    assert!(Rc::ptr_eq(
        &many(&found[0], "tags")[1],
        &many(&found[1], "tags")[0]
    ));
}

#[test]
fn many_to_many_from_the_other_side() {
    let fixture = setup_db();
    let tags = Query::new(tags())
        .with("dogs")
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();

    let mut good = names(&many(&tags[0], "dogs"));
    good.sort();
    assert_eq!(good, vec!["Max", "Rex"]);
    assert_eq!(names(&many(&tags[2], "dogs")), vec!["Fido"]);
    assert!(
        fixture.storage.log()[1]
            .sql
            .contains("INNER JOIN `dogs_tags` ON `dogs_tags`.`dogsId` = `dogs`.`id`")
    );
}

// =============================================================================
// Nesting
// =============================================================================

#[test]
fn nested_batches_issue_one_query_per_level() {
    let fixture = setup_db();
    let owners = Query::new(owners())
        .with("dogs.tags")
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(fixture.storage.reads(), 3);

    let anns = many(&owners[0], "dogs");
    assert_eq!(names(&many(&anns[0], "tags")), vec!["good"]);
    assert_eq!(names(&many(&anns[1], "tags")), vec!["loud", "good"]);
}

#[test]
fn join_and_batch_mix() {
    let fixture = setup_db();
    let found = Query::new(dogs())
        .with("animal")
        .unwrap()
        .with("tags")
        .unwrap()
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(found.len(), 4);
    assert_eq!(fixture.storage.reads(), 2);
}

#[test]
fn nested_under_a_joined_relation() {
    let fixture = setup_db();
    let found = by_id(&fixture, "owner.dogs");
    assert_eq!(fixture.storage.reads(), 2);

    let ann = one(&found[0], "owner").unwrap();
    assert_eq!(names(&many(&ann, "dogs")), vec!["Max", "Rex"]);

    // Rex and Max share their owner
    assert!(Rc::ptr_eq(&ann, &one(&found[1], "owner").unwrap()));
}

#[test]
fn relation_value_with_nested_path() {
    let fixture = setup_db();
    let owner = dogs().relation("owner").unwrap().clone().with("license").unwrap();
    let found = Query::new(dogs())
        .with(owner)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(fixture.storage.reads(), 2);

    let ann = one(&found[0], "owner").unwrap();
    assert!(ann.borrow().is_set("license"));
    let bob = one(&found[2], "owner").unwrap();
    assert!(bob.borrow().is_loaded("license"));
    assert!(!bob.borrow().is_set("license"));
}

#[test]
fn unknown_relation_is_a_usage_error() {
    let err = Query::new(dogs()).with("collar").unwrap_err();
    assert!(matches!(err, TetherError::Usage(_)));
    let err = Query::new(dogs()).with("owner.collar").unwrap_err();
    assert!(matches!(err, TetherError::Usage(_)));
}
