use crate::common::*;
use tether::prelude::*;
use tether::SqlValue;

#[test]
fn fetch_materializes_persisted_entities() {
    let fixture = setup_db();
    let found = Query::new(dogs())
        .order_by("name", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Fido", "Max", "Rex", "Stray"]);
    assert_eq!(fixture.storage.reads(), 1);

    for dog in &found {
        let dog = dog.borrow();
        assert!(dog.exists());
        assert!(dog.changed_fields().unwrap().is_empty());
    }
}

#[test]
fn find_and_first() {
    let fixture = setup_db();
    let rex = fixture.db.find(dogs(), 1).unwrap().unwrap();
    assert_eq!(names(&[rex]), vec!["Rex"]);
    assert!(fixture.db.find(dogs(), 99).unwrap().is_none());

    let first = Query::new(dogs())
        .order_by("id", OrderBy::Desc)
        .first(&fixture.db)
        .unwrap()
        .unwrap();
    assert_eq!(id(&first), 4);
    assert!(fixture.storage.log()[2].sql.ends_with("LIMIT 1"));
}

#[test]
fn count_ignores_relations() {
    let fixture = setup_db();
    let query = Query::new(dogs())
        .r#where(eq("animal_id", 1))
        .unwrap()
        .with("tags")
        .unwrap();
    assert_eq!(query.count(&fixture.db).unwrap(), 3);
    assert_eq!(fixture.storage.reads(), 1);

    let none = Query::new(dogs()).r#where(eq("name", "Nobody")).unwrap();
    assert_eq!(none.count(&fixture.db).unwrap(), 0);
}

#[test]
fn paging() {
    let fixture = setup_db();
    let page = Query::new(dogs())
        .order_by("id", OrderBy::Asc)
        .limit_offset(2, 1)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&page), vec!["Max", "Fido"]);

    // OFFSET alone still needs a LIMIT in SQLite
    let tail = Query::new(dogs())
        .order_by("id", OrderBy::Asc)
        .offset(3)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&tail), vec!["Stray"]);
    assert!(fixture.storage.log()[1].sql.ends_with("LIMIT -1 OFFSET 3"));
}

#[test]
fn partial_projection_leaves_columns_absent() {
    let fixture = setup_db();
    let rex = Query::new(dogs())
        .select(["name"])
        .unwrap()
        .r#where(eq("id", 1))
        .unwrap()
        .first(&fixture.db)
        .unwrap()
        .unwrap();

    let mut rex = rex.borrow_mut();
    assert!(rex.get("born").unwrap().is_absent());
    assert_eq!(rex.value("name"), Some(&Value::from("Rex")));
    assert!(rex.changed_fields().unwrap().is_empty());

    rex.set("name", "Rexy").unwrap();
    assert_eq!(rex.changed_fields().unwrap(), vec!["name"]);
}

#[test]
fn aliased_base_query() {
    let fixture = setup_db();
    let found = Query::aliased(dogs(), "d")
        .r#where(eq("d.name", "Max"))
        .unwrap()
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Max"]);
    assert!(
        fixture.storage.log()[0]
            .sql
            .starts_with("SELECT `d`.* FROM `dogs` AS `d` WHERE")
    );
}

#[test]
fn composed_queries_do_not_alias() {
    let fixture = setup_db();
    let base = Query::new(dogs()).r#where(eq("animal_id", 1)).unwrap();
    let named = base.clone().and_where(eq("name", "Rex")).unwrap();

    assert_eq!(base.fetch(&fixture.db).unwrap().len(), 3);
    assert_eq!(named.fetch(&fixture.db).unwrap().len(), 1);
}

#[test]
fn hooks_see_entities_with_their_rows() {
    let fixture = setup_db();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = seen.clone();
    Query::new(dogs())
        .with("animal")
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .hook(move |_, entities, rows| {
            assert_eq!(entities.len(), rows.len());
            for row in rows {
                sink.borrow_mut().push(row["animal"]["species"].clone());
            }
            Ok(())
        })
        .fetch(&fixture.db)
        .unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![
            SqlValue::from("canis"),
            SqlValue::from("canis"),
            SqlValue::from("vulpes"),
            SqlValue::from("canis"),
        ]
    );
}

#[test]
fn storage_errors_surface() {
    let fixture = setup_db();
    fixture.storage.execute_batch("DROP TABLE licenses");
    let err = Query::new(licenses()).fetch(&fixture.db).unwrap_err();
    assert!(matches!(err, tether::TetherError::Storage(_)));
}
