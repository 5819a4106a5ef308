#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for field restore.

use activitylog::{AuditLogStore, EventKind, RestoreError, SubjectRef};
use activitylog_test_utils::{Fault, field_map, test_entry, test_user};
use serde_json::json;

mod common;
use common::TestApp;

fn user_42() -> SubjectRef {
    SubjectRef::new("User", "42")
}

#[tokio::test]
async fn test_restores_previous_status() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .attributes(json!({"status": "archived"}))
        .append_to(app.memory())
        .await;

    let outcome = app.engine.restore_fields(entry.id).await.unwrap();

    assert_eq!(outcome.entity.fields, field_map(json!({"status": "active"})));
    assert_eq!(app.entity(&user_42()).fields["status"], json!("active"));
}

#[tokio::test]
async fn test_logs_inverse_snapshot() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .attributes(json!({"status": "archived"}))
        .append_to(app.memory())
        .await;

    let outcome = app.engine.restore_fields(entry.id).await.unwrap();
    let logged = outcome.logged.expect("restore should be logged");

    assert_eq!(logged.event, EventKind::Restored);
    assert_eq!(logged.subject, Some(user_42()));
    assert_eq!(logged.causer_id.as_deref(), Some("1"));
    assert_eq!(logged.causer_name.as_deref(), Some("Admin"));
    assert_eq!(logged.old(), Some(&field_map(json!({"status": "archived"}))));
    assert_eq!(
        logged.attributes(),
        Some(&field_map(json!({"status": "active"})))
    );

    // Only the explicit restore entry is added; the write itself is not logged.
    let entries = app.memory().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1], logged);
}

#[tokio::test]
async fn test_never_touches_the_source_entry() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    app.engine.restore_fields(entry.id).await.unwrap();

    assert_eq!(app.memory().find(entry.id).await.unwrap(), Some(entry));
}

#[tokio::test]
async fn test_missing_attributes_log_without_old() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    let logged = app.engine.restore_fields(entry.id).await.unwrap().logged.unwrap();

    assert!(logged.old().is_none());
    assert_eq!(logged.attributes(), Some(&field_map(json!({"status": "active"}))));
}

#[tokio::test]
async fn test_restore_of_restore_round_trips() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived", "name": "Ada"})))
        .await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .attributes(json!({"status": "archived"}))
        .append_to(app.memory())
        .await;

    let first = app.engine.restore_fields(entry.id).await.unwrap();
    let inverse = first.logged.unwrap();
    app.engine.restore_fields(inverse.id).await.unwrap();

    assert_eq!(
        app.entity(&user_42()).fields,
        field_map(json!({"status": "archived", "name": "Ada"}))
    );
}

#[tokio::test]
async fn test_without_actor_restores_but_does_not_log() {
    let app = TestApp::anonymous();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    let outcome = app.engine.restore_fields(entry.id).await.unwrap();

    assert!(outcome.logged.is_none());
    assert_eq!(app.entity(&user_42()).fields["status"], json!("active"));
    assert_eq!(app.memory().entry_count(), 1);
}

#[tokio::test]
async fn test_missing_old_fails_without_mutation() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Created)
        .on("User", "42")
        .attributes(json!({"status": "archived"}))
        .append_to(app.memory())
        .await;
    let before = app.snapshot(&user_42());

    let err = app.engine.restore_fields(entry.id).await.unwrap_err();

    assert!(matches!(err, RestoreError::NoPriorState));
    assert_eq!(app.snapshot(&user_42()), before);
}

#[tokio::test]
async fn test_unknown_entry_fails_without_mutation() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let before = app.snapshot(&user_42());

    let err = app.engine.restore_fields(999).await.unwrap_err();

    assert!(matches!(err, RestoreError::EntryNotFound(999)));
    assert_eq!(app.snapshot(&user_42()), before);
}

#[tokio::test]
async fn test_missing_subject_is_reported() {
    let app = TestApp::new();
    let entry = test_entry(EventKind::Updated)
        .on("User", "404")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    let err = app.engine.restore_fields(entry.id).await.unwrap_err();
    assert!(matches!(err, RestoreError::SubjectNotFound));

    let system = test_entry(EventKind::Updated)
        .old(json!({"mode": "maintenance"}))
        .append_to(app.memory())
        .await;
    let err = app.engine.restore_fields(system.id).await.unwrap_err();
    assert!(matches!(err, RestoreError::SubjectNotFound));
}

#[tokio::test]
async fn test_update_failure_is_reported_and_logging_resumes() {
    let app = TestApp::new();
    let user = app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    app.store.fail_on(Fault::Update);
    let err = app.engine.restore_fields(entry.id).await.unwrap_err();

    assert!(matches!(err, RestoreError::RestoreFailed(_)));
    assert!(err.to_string().contains("failed to update subject User#42"));
    assert_eq!(app.memory().entry_count(), 1);
    assert!(!app.memory().suppression().is_active());

    // Later unrelated writes are logged again.
    app.store.clear_faults();
    activitylog::EntityStore::update(
        app.memory(),
        &user,
        &field_map(json!({"status": "pending"})),
    )
    .await
    .unwrap();
    assert_eq!(app.memory().entry_count(), 2);
}

#[tokio::test]
async fn test_resolve_failure_is_reported() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    app.store.fail_on(Fault::Resolve);
    let err = app.engine.restore_fields(entry.id).await.unwrap_err();

    assert!(matches!(err, RestoreError::RestoreFailed(_)));
    assert_eq!(app.entity(&user_42()).fields["status"], json!("archived"));
}

#[tokio::test]
async fn test_lookup_failure_is_reported() {
    let app = TestApp::new();
    app.store.fail_on(Fault::Find);

    let err = app.engine.restore_fields(1).await.unwrap_err();
    assert!(matches!(err, RestoreError::RestoreFailed(_)));
}

#[tokio::test]
async fn test_append_failure_leaves_subject_updated() {
    let app = TestApp::new();
    app.seed(test_user("42", json!({"status": "archived"}))).await;
    let entry = test_entry(EventKind::Updated)
        .on("User", "42")
        .old(json!({"status": "active"}))
        .append_to(app.memory())
        .await;

    app.store.fail_on(Fault::Append);
    let err = app.engine.restore_fields(entry.id).await.unwrap_err();

    // Known gap: the write is not undone when logging it fails.
    assert!(matches!(err, RestoreError::RestoreFailed(_)));
    assert_eq!(app.entity(&user_42()).fields["status"], json!("active"));
    assert_eq!(app.memory().entry_count(), 1);
}
