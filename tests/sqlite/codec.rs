use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::common::*;
use tether::codec::to_structured;
use tether::error::CodecError;
use tether::prelude::*;
use tether::TetherError;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Meta {
    weight: i64,
}

fn find_err(fixture: &Fixture, dog: i64) -> TetherError {
    fixture.db.find(dogs(), dog).unwrap_err()
}

// =============================================================================
// Structured columns
// =============================================================================

#[test]
fn untagged_payload_migrates_on_read() {
    let fixture = setup_db();
    let rex = fixture.find(dogs(), 1);
    assert_eq!(
        rex.borrow().structured::<Meta>("meta").unwrap(),
        Some(Meta { weight: 30 })
    );

    let max = fixture.find(dogs(), 2);
    assert_eq!(
        max.borrow().structured::<Meta>("meta").unwrap(),
        Some(Meta { weight: 12 })
    );

    let fido = fixture.find(dogs(), 3);
    assert_eq!(fido.borrow().structured::<Meta>("meta").unwrap(), None);
}

#[test]
fn migrated_payload_is_not_a_change() {
    let fixture = setup_db();
    let rex = fixture.find(dogs(), 1);
    assert!(rex.borrow().changed_fields().unwrap().is_empty());
    assert_eq!(fixture.db.save(&rex).unwrap(), SaveOutcome::NoOp);
}

#[test]
fn structured_writes_carry_the_current_version() {
    let fixture = setup_db();
    let rex = fixture.find(dogs(), 1);
    rex.borrow_mut()
        .set("meta", to_structured(&Meta { weight: 31 }).unwrap())
        .unwrap();

    assert_eq!(
        fixture.db.save(&rex).unwrap(),
        SaveOutcome::Updated(vec!["meta"])
    );
    let storage = &fixture.storage;
    assert_eq!(
        storage.scalar("SELECT json_extract(meta, '$.v') FROM dogs WHERE id = 1"),
        1
    );
    assert_eq!(
        storage.scalar("SELECT json_extract(meta, '$.data.weight') FROM dogs WHERE id = 1"),
        31
    );
}

#[test]
fn key_order_does_not_count_as_a_change() {
    let fixture = setup_db();
    fixture.storage.execute_batch(
        r#"UPDATE dogs SET meta = '{"data": {"weight": 12, "note": "x"}, "v": 1}' WHERE id = 2"#,
    );
    let max = fixture.find(dogs(), 2);
    max.borrow_mut()
        .set(
            "meta",
            serde_json::json!({ "note": "x", "weight": 12 }),
        )
        .unwrap();
    assert_eq!(fixture.db.save(&max).unwrap(), SaveOutcome::NoOp);
}

#[test]
fn newer_payload_versions_are_rejected() {
    let fixture = setup_db();
    fixture
        .storage
        .execute_batch(r#"UPDATE dogs SET meta = '{"v": 9, "data": {}}' WHERE id = 3"#);
    assert!(matches!(
        find_err(&fixture, 3),
        TetherError::Codec(CodecError::UnsupportedVersion {
            found: 9,
            current: 1,
            ..
        })
    ));
}

#[test]
fn malformed_json_is_a_codec_error() {
    let fixture = setup_db();
    fixture
        .storage
        .execute_batch("UPDATE dogs SET meta = '{oops' WHERE id = 3");
    assert!(matches!(
        find_err(&fixture, 3),
        TetherError::Codec(CodecError::Json { .. })
    ));
}

// =============================================================================
// Temporal and boolean columns
// =============================================================================

#[test]
fn dates_decode_and_store_as_text() {
    let fixture = setup_db();
    let rex = fixture.find(dogs(), 1);
    assert_eq!(
        rex.borrow().value("born"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2019, 4, 1).unwrap()))
    );

    let fido = fixture.find(dogs(), 3);
    fido.borrow_mut()
        .set("born", NaiveDate::from_ymd_opt(2021, 12, 24).unwrap())
        .unwrap();
    fixture.db.save(&fido).unwrap();
    assert_eq!(
        fixture
            .storage
            .scalar("SELECT COUNT(*) FROM dogs WHERE born = '2021-12-24'"),
        1
    );
}

#[test]
fn datetimes_store_with_seconds() {
    let fixture = setup_db();
    let seen = NaiveDateTime::parse_from_str("2024-05-06 07:08:09", "%Y-%m-%d %H:%M:%S").unwrap();
    let dog = Entity::with_values(
        dogs(),
        [
            ("name", Value::from("Scout")),
            ("animal_id", Value::from(1)),
            ("seen_at", Value::from(seen)),
        ],
    )
    .unwrap()
    .into_ref();
    fixture.db.save(&dog).unwrap();

    assert_eq!(
        fixture
            .storage
            .scalar("SELECT COUNT(*) FROM dogs WHERE seen_at = '2024-05-06 07:08:09'"),
        1
    );
    let fetched = fixture.find(dogs(), id(&dog));
    assert_eq!(fetched.borrow().value("seen_at"), Some(&Value::DateTime(seen)));
}

#[test]
fn invalid_temporal_text() {
    let fixture = setup_db();
    fixture
        .storage
        .execute_batch("UPDATE dogs SET born = 'yesterday' WHERE id = 3");
    match find_err(&fixture, 3) {
        TetherError::Codec(CodecError::InvalidTemporal { column, kind, value }) => {
            assert_eq!(column, "born");
            assert_eq!(kind, "date");
            assert_eq!(value, "yesterday");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn booleans_store_as_integers() {
    let fixture = setup_db();
    let stray = fixture.find(dogs(), 4);
    assert_eq!(stray.borrow().value("active"), Some(&Value::Boolean(true)));

    stray.borrow_mut().set("active", false).unwrap();
    fixture.db.save(&stray).unwrap();
    assert_eq!(
        fixture.storage.scalar("SELECT active FROM dogs WHERE id = 4"),
        0
    );
}
