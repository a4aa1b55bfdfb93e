use crate::common::*;
use tether::prelude::*;
use tether::{JoinNode, JoinType, SqlValue};

fn fetch_names(filter: Filter) -> Vec<String> {
    let fixture = setup_db();
    let found = Query::new(dogs())
        .r#where(filter)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    names(&found)
}

#[test]
fn equality_and_ordering() {
    assert_eq!(fetch_names(eq("name", "Rex")), vec!["Rex"]);
    assert_eq!(fetch_names(neq("animal_id", 1)), vec!["Fido"]);
    assert_eq!(fetch_names(gt("id", 2)), vec!["Fido", "Stray"]);
    assert_eq!(fetch_names(lte("id", 2)), vec!["Rex", "Max"]);
}

#[test]
fn null_comparisons() {
    assert_eq!(fetch_names(eq("owner_id", Value::Null)), vec!["Stray"]);
    assert_eq!(fetch_names(is_not_null("born")), vec!["Rex"]);
}

#[test]
fn list_membership() {
    assert_eq!(fetch_names(in_array("id", [4, 1])), vec!["Rex", "Stray"]);
    assert_eq!(fetch_names(not_in_array("id", [1, 2, 3])), vec!["Stray"]);

    // A null member also matches null columns
    assert_eq!(
        fetch_names(in_array("owner_id", [Value::from(2), Value::Null])),
        vec!["Fido", "Stray"]
    );
}

#[test]
fn empty_lists_are_constant() {
    assert!(fetch_names(in_array("id", Vec::<i64>::new())).is_empty());
    assert_eq!(fetch_names(not_in_array("id", Vec::<i64>::new())).len(), 4);
}

#[test]
fn patterns() {
    assert_eq!(fetch_names(like("name", "%x")), vec!["Rex", "Max"]);
    assert_eq!(fetch_names(not_like("name", "%x")), vec!["Fido", "Stray"]);
}

#[test]
fn nested_boolean_logic() {
    let filter = any([
        eq("name", "Rex"),
        and(eq("animal_id", 2), neq("name", "Max")),
    ])
    .unwrap();
    assert_eq!(fetch_names(filter), vec!["Rex", "Fido"]);

    let filter = not(or(eq("animal_id", 2), eq("owner_id", Value::Null)));
    assert_eq!(fetch_names(filter), vec!["Rex", "Max"]);
}

#[test]
fn mapping_filter_is_a_conjunction() {
    let fixture = setup_db();
    let found = Query::new(dogs())
        .r#where([("animal_id", 1), ("owner_id", 1)])
        .unwrap()
        .order_by("name", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Max", "Rex"]);

    let statement = &fixture.storage.log()[0];
    assert!(statement.sql.ends_with(
        "WHERE `dogs`.`animal_id` = ? AND `dogs`.`owner_id` = ? ORDER BY `dogs`.`name` ASC"
    ));
    assert_eq!(statement.params.len(), 2);
}

#[test]
fn mapping_with_a_list_and_its_negation() {
    let fixture = setup_db();
    fixture.storage.reset();
    let names_of = |query: Query| {
        let found = query
            .order_by("id", OrderBy::Asc)
            .fetch(&fixture.db)
            .unwrap();
        names(&found)
    };

    let matching = Query::new(dogs())
        .r#where([("name", ["Rex", "Max"])])
        .unwrap();
    assert_eq!(names_of(matching), vec!["Rex", "Max"]);

    let others = Query::new(dogs())
        .where_not([("name", ["Rex", "Max"])])
        .unwrap();
    assert_eq!(names_of(others), vec!["Fido", "Stray"]);

    let log = fixture.storage.log();
    let expected = SqlValue::List(vec![SqlValue::from("Rex"), SqlValue::from("Max")]);
    assert!(log[0].sql.contains("WHERE `dogs`.`name` IN (?)"));
    assert_eq!(log[0].params, vec![expected.clone()]);
    assert!(log[1].sql.contains("WHERE `dogs`.`name` NOT IN (?)"));
    assert_eq!(log[1].params, vec![expected]);
}

#[test]
fn chained_where_clauses() {
    let fixture = setup_db();
    let found = Query::new(dogs())
        .r#where(eq("animal_id", 1))
        .unwrap()
        .and_where(is_not_null("owner_id"))
        .unwrap()
        .or_where(eq("name", "Fido"))
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Rex", "Max", "Fido"]);

    let found = Query::new(dogs())
        .where_not(eq("animal_id", 1))
        .unwrap()
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Fido"]);
}

#[test]
fn column_comparison_across_joins() {
    let fixture = setup_db();

    // Dogs whose owner id equals their own id
    let found = Query::new(dogs())
        .join(owners(), "o", eq_columns("id", "dogs.owner_id"))
        .unwrap()
        .r#where(eq_columns("o.id", "dogs.id"))
        .unwrap()
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Rex"]);

    let found = Query::new(dogs())
        .join(owners(), "o", eq_columns("id", "dogs.owner_id"))
        .unwrap()
        .r#where(compare_columns("o.id", Sign::Lt, "dogs.id"))
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Max", "Fido"]);
}

#[test]
fn entity_qualifier_follows_join_alias() {
    let fixture = setup_db();
    let query = Query::new(dogs())
        .join(animals(), "a", eq_columns("id", "dogs.animal_id"))
        .unwrap()
        .r#where(eq(Selector::new("species").on(animals()), "vulpes"))
        .unwrap();
    assert!(query.to_sql().unwrap().sql.contains("WHERE `a`.`species` = ?"));

    let found = query.fetch(&fixture.db).unwrap();
    assert_eq!(names(&found), vec!["Fido"]);
}

#[test]
fn hidden_join_filters_without_projecting() {
    let fixture = setup_db();
    let on = eq_columns("dogsId", "dogs.id");
    let found = Query::new(dogs())
        .join_node(JoinNode::table(JoinType::Inner, "dogs_tags", "link", on).hidden())
        .r#where(eq("link.tagsId", 1))
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .fetch(&fixture.db)
        .unwrap();
    assert_eq!(names(&found), vec!["Rex", "Max"]);
    assert!(fixture.storage.log()[0].sql.starts_with("SELECT `dogs`.* FROM"));
}

#[test]
fn invalid_filters_fail_before_any_statement() {
    let fixture = setup_db();
    assert!(Query::new(dogs()).r#where(gt("id", [1, 2])).is_err());
    assert!(Query::new(dogs()).r#where(Vec::<Filter>::new()).is_err());
    assert!(Query::new(dogs()).r#where(Filter::leaf("id", Sign::In, 3)).is_err());
    assert_eq!(fixture.storage.reads(), 0);
}

#[test]
fn full_text_match_is_not_sqlite_syntax() {
    let fixture = setup_db();
    let query = Query::new(dogs())
        .r#where(match_against("name", "+Rex"))
        .unwrap();
    assert!(query.to_sql().unwrap().sql.contains("MATCH (`dogs`.`name`) AGAINST"));
    assert!(matches!(
        query.fetch(&fixture.db),
        Err(tether::TetherError::Storage(_))
    ));
}
