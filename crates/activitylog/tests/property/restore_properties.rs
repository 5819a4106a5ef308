#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Property tests: field restore sets the old snapshot, restores round-trip,
//! and only `deleted` entries are soft-delete restorable.

use std::collections::BTreeMap;

use activitylog::{EventKind, FieldMap, RestoreError, SubjectRef};
use activitylog_test_utils::{test_entry, test_user};
use proptest::prelude::*;
use serde_json::{Value, json};

#[path = "../common/mod.rs"]
mod common;
use common::TestApp;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

/// Split `key -> (before, after)` pairs into the `old` and `attributes`
/// snapshots of one update.
fn snapshots(pairs: &BTreeMap<String, (String, String)>) -> (Value, Value) {
    let old: FieldMap = pairs
        .iter()
        .map(|(k, (s, _))| (k.clone(), Value::String(s.clone())))
        .collect();
    let attributes: FieldMap = pairs
        .iter()
        .map(|(k, (_, t))| (k.clone(), Value::String(t.clone())))
        .collect();
    (Value::Object(old), Value::Object(attributes))
}

fn field_pairs() -> impl Strategy<Value = BTreeMap<String, (String, String)>> {
    prop::collection::btree_map("[a-e]{1,3}", ("[a-z]{0,6}", "[a-z]{0,6}"), 1..6)
}

fn non_deleted_event() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just(EventKind::Created),
        Just(EventKind::Updated),
        Just(EventKind::Restored),
        Just(EventKind::Draft),
        "[a-z]{3,10}"
            .prop_filter("must not name a deletion", |s| s != "deleted")
            .prop_map(EventKind::from),
    ]
}

proptest! {
    #[test]
    fn restore_writes_old_and_logs_inverse(pairs in field_pairs()) {
        let (old, attributes) = snapshots(&pairs);
        let (fields, logged) = block_on(async {
            let app = TestApp::new();
            app.seed(test_user("1", attributes.clone())).await;
            let entry = test_entry(EventKind::Updated)
                .on("User", "1")
                .old(old.clone())
                .attributes(attributes.clone())
                .append_to(app.memory())
                .await;
            let outcome = app.engine.restore_fields(entry.id).await.unwrap();
            (app.entity(&SubjectRef::new("User", "1")).fields, outcome.logged.unwrap())
        });

        prop_assert_eq!(Value::Object(fields), old.clone());
        prop_assert_eq!(&logged.event, &EventKind::Restored);
        prop_assert_eq!(logged.attributes().cloned().map(Value::Object), Some(old));
        prop_assert_eq!(logged.old().cloned().map(Value::Object), Some(attributes));
    }

    #[test]
    fn restoring_the_inverse_round_trips(pairs in field_pairs()) {
        let (old, attributes) = snapshots(&pairs);
        let fields = block_on(async {
            let app = TestApp::new();
            app.seed(test_user("1", attributes.clone())).await;
            let entry = test_entry(EventKind::Updated)
                .on("User", "1")
                .old(old)
                .attributes(attributes.clone())
                .append_to(app.memory())
                .await;
            let inverse = app.engine.restore_fields(entry.id).await.unwrap().logged.unwrap();
            app.engine.restore_fields(inverse.id).await.unwrap();
            app.entity(&SubjectRef::new("User", "1")).fields
        });

        prop_assert_eq!(Value::Object(fields), attributes);
    }

    #[test]
    fn failed_restore_changes_nothing(pairs in field_pairs()) {
        let (_, attributes) = snapshots(&pairs);
        let (err, before, after) = block_on(async {
            let app = TestApp::new();
            app.seed(test_user("1", attributes.clone())).await;
            let entry = test_entry(EventKind::Created)
                .on("User", "1")
                .attributes(attributes)
                .append_to(app.memory())
                .await;
            let subject = SubjectRef::new("User", "1");
            let before = app.snapshot(&subject);
            let err = app.engine.restore_fields(entry.id).await.unwrap_err();
            (err, before, app.snapshot(&subject))
        });

        prop_assert!(matches!(err, RestoreError::NoPriorState));
        prop_assert_eq!(before, after);
    }

    #[test]
    fn only_deleted_entries_are_soft_delete_restorable(event in non_deleted_event()) {
        let restorable = block_on(async {
            let app = TestApp::new();
            app.seed_deleted(test_user("1", json!({}))).await;
            let entry = test_entry(event)
                .on("User", "1")
                .append_to(app.memory())
                .await;
            app.engine.can_restore_from_soft_delete(entry.id).await
        });

        prop_assert!(!restorable);
    }
}
