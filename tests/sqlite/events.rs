use std::cell::RefCell;
use std::rc::Rc;

use crate::common::*;
use tether::prelude::*;
use tether::{Field, LifecycleEvent};

/// Records `(kind, table)` for every event.
fn record(fixture: &Fixture) -> Rc<RefCell<Vec<(&'static str, &'static str)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    fixture.db.events().subscribe(move |event| {
        let kind = match event {
            LifecycleEvent::Created(_) => "created",
            LifecycleEvent::Updated(_) => "updated",
            LifecycleEvent::Deleted(_) => "deleted",
        };
        sink.borrow_mut().push((kind, event.table()));
    });
    seen
}

#[test]
fn one_event_per_successful_write() {
    let fixture = setup_db();
    let seen = record(&fixture);

    let dog = Entity::with_values(
        dogs(),
        [("name", Value::from("Buddy")), ("animal_id", Value::from(1))],
    )
    .unwrap()
    .into_ref();
    fixture.db.save(&dog).unwrap();
    dog.borrow_mut().set("name", "Bud").unwrap();
    fixture.db.save(&dog).unwrap();
    fixture.db.save(&dog).unwrap();
    fixture.db.delete(&dog).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![
            ("created", "dogs"),
            ("updated", "dogs"),
            ("deleted", "dogs")
        ]
    );
}

#[test]
fn failed_saves_are_silent() {
    let fixture = setup_db();
    let seen = record(&fixture);

    let nameless = Entity::new(dogs()).into_ref();
    assert!(fixture.db.save(&nameless).is_err());
    assert!(seen.borrow().is_empty());
}

#[test]
fn update_carries_previous_values() {
    let fixture = setup_db();
    let rex = fixture.find(dogs(), 1);

    let captured = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);
    fixture.db.events().subscribe(move |event| {
        if let LifecycleEvent::Updated(update) = event {
            let old = update.old_version();
            *sink.borrow_mut() = Some((
                update.changed().to_vec(),
                update.previous("name").cloned(),
                update.previous("born").cloned(),
                old.value("name").cloned(),
                old.value("animal_id").cloned(),
                old.exists(),
            ));
        }
    });

    rex.borrow_mut().set("name", "Rexy").unwrap();
    rex.borrow_mut().set_null("born").unwrap();
    fixture.db.save(&rex).unwrap();

    let (changed, name, born, old_name, old_animal, old_exists) =
        captured.borrow_mut().take().expect("update event");
    assert_eq!(changed, vec!["name", "born"]);
    assert_eq!(name, Some(Field::Value(Value::from("Rex"))));
    assert_eq!(
        born,
        Some(Field::Value(Value::from(
            chrono::NaiveDate::from_ymd_opt(2019, 4, 1).unwrap()
        )))
    );
    assert_eq!(old_name, Some(Value::from("Rex")));
    assert_eq!(old_animal, Some(Value::from(1)));
    assert!(old_exists);

    // The live entity keeps its new values
    assert_eq!(rex.borrow().value("name"), Some(&Value::from("Rexy")));
}

#[test]
fn listeners_see_the_saved_instance() {
    let fixture = setup_db();
    let ids = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&ids);
    fixture.db.events().subscribe(move |event| {
        sink.borrow_mut().push(id(event.entity()));
    });

    let owner = Entity::with_values(owners(), [("name", "Dee")])
        .unwrap()
        .into_ref();
    fixture.db.save(&owner).unwrap();
    assert_eq!(*ids.borrow(), vec![4]);
}

#[test]
fn unsubscribe_stops_delivery() {
    let fixture = setup_db();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let subscription = fixture
        .db
        .events()
        .subscribe(move |_| *sink.borrow_mut() += 1);

    let rex = fixture.find(dogs(), 1);
    rex.borrow_mut().set("name", "Rexy").unwrap();
    fixture.db.save(&rex).unwrap();
    assert_eq!(*count.borrow(), 1);

    assert!(fixture.db.events().unsubscribe(subscription));
    assert!(!fixture.db.events().unsubscribe(subscription));
    rex.borrow_mut().set("name", "Rex").unwrap();
    fixture.db.save(&rex).unwrap();
    assert_eq!(*count.borrow(), 1);
    assert!(fixture.db.events().is_empty());
}
