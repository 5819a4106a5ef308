//! Display helpers and restore notices.
//!
//! Property values are stored with their nested structure intact and only
//! flattened here, when rendered.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::RestoreError;
use crate::models::{AuditEntry, EventKind, FieldMap};
use crate::resource::headline;
use crate::restore::RestoreOutcome;

/// Placeholder for absent values.
pub const EMPTY: &str = "-";

/// Placeholder for an unknown causer.
pub const NO_CAUSER: &str = "\u{2014}";

/// Flatten a field map for key/value display. Nested arrays and objects
/// become compact JSON; strings are shown without quotes.
pub fn flatten_for_display(fields: &FieldMap) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), display_value(value)))
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// What is known about an entry's subject when rendering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectState {
    Present,
    SoftDeleted,
    Missing,
}

/// Subject column text: `"User # 42"`, with a suffix when the subject is
/// soft-deleted or gone.
pub fn subject_label(entry: &AuditEntry, state: SubjectState) -> String {
    let Some(subject) = &entry.subject else {
        return EMPTY.to_string();
    };

    let mut label = format!("{} # {}", headline(&subject.subject_type), subject.subject_id);
    match state {
        SubjectState::Present => {}
        SubjectState::SoftDeleted => label.push_str(" (soft deleted)"),
        SubjectState::Missing => label.push_str(" (deleted)"),
    }
    label
}

/// Uppercase the first letter of every whitespace-separated word.
fn title_words(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn log_name_label(log_name: Option<&str>) -> String {
    match log_name {
        Some(name) if !name.is_empty() => title_words(name),
        _ => EMPTY.to_string(),
    }
}

pub fn event_label(event: &EventKind) -> String {
    match event.as_str() {
        "" => EMPTY.to_string(),
        name => title_words(name),
    }
}

/// Badge color of an event.
pub fn event_color(event: &EventKind) -> &'static str {
    match event {
        EventKind::Draft => "gray",
        EventKind::Updated => "warning",
        EventKind::Created => "success",
        EventKind::Deleted => "danger",
        EventKind::Restored => "info",
        EventKind::Other(_) => "primary",
    }
}

pub fn causer_label(name: Option<&str>) -> String {
    name.filter(|n| !n.is_empty())
        .unwrap_or(NO_CAUSER)
        .to_string()
}

/// Render `created_at` with a chrono format string, falling back to
/// RFC 3339 when the format cannot be rendered.
pub fn format_created_at(created_at: &DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", created_at.format(format)) {
        Ok(()) => out,
        Err(_) => created_at.to_rfc3339(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Danger,
}

/// User-facing outcome of a restore, keyed for translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title_key: &'static str,
    pub body: Option<String>,
}

impl Notice {
    fn success(title_key: &'static str) -> Self {
        Self {
            level: NoticeLevel::Success,
            title_key,
            body: None,
        }
    }

    fn danger(title_key: &'static str, body: Option<String>) -> Self {
        Self {
            level: NoticeLevel::Danger,
            title_key,
            body,
        }
    }

    /// Notice for the result of a field restore.
    pub fn for_field_restore(result: &Result<RestoreOutcome, RestoreError>) -> Self {
        match result {
            Ok(_) => Self::success("activity_restored_successfully"),
            Err(RestoreError::EntryNotFound(_)) => Self::danger("activity_not_found", None),
            Err(RestoreError::NoPriorState) => Self::danger("no_properties_to_restore", None),
            Err(RestoreError::SubjectNotFound) => Self::danger("subject_not_found", None),
            Err(e) => Self::danger("failed_to_restore_activity", Some(e.to_string())),
        }
    }

    /// Notice for the result of a soft-delete restore.
    pub fn for_soft_delete_restore(result: &Result<RestoreOutcome, RestoreError>) -> Self {
        match result {
            Ok(_) => Self::success("model_successfully_restored"),
            Err(e @ RestoreError::RestoreFailed(_)) => {
                Self::danger("error_restoring_model", Some(e.to_string()))
            }
            Err(_) => Self::danger("unable_to_restore_this_model", None),
        }
    }
}

/// Destination for restore notices.
pub trait NotificationSink: Send + Sync {
    fn send(&self, notice: &Notice);
}

/// Sink that emits notices as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, notice: &Notice) {
        let body = notice.body.as_deref().unwrap_or("");
        match notice.level {
            NoticeLevel::Success => info!(notice = notice.title_key, body, "notification"),
            NoticeLevel::Danger => warn!(notice = notice.title_key, body, "notification"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{AuditEntryDraft, SubjectRef};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn flatten_encodes_nested_values() {
        let fields = json!({
            "name": "Ada",
            "age": 36,
            "admin": false,
            "tags": ["a", "b"],
            "address": {"city": "London"},
            "deleted_at": null
        });
        let flat = flatten_for_display(fields.as_object().unwrap());

        assert_eq!(flat["name"], "Ada");
        assert_eq!(flat["age"], "36");
        assert_eq!(flat["admin"], "false");
        assert_eq!(flat["tags"], r#"["a","b"]"#);
        assert_eq!(flat["address"], r#"{"city":"London"}"#);
        assert_eq!(flat["deleted_at"], "");
    }

    #[test]
    fn subject_labels() {
        let entry = AuditEntryDraft::new(EventKind::Deleted)
            .performed_on(SubjectRef::new("App\\Models\\BlogPost", "42"))
            .into_entry(1, Utc::now());

        assert_eq!(subject_label(&entry, SubjectState::Present), "Blog Post # 42");
        assert_eq!(
            subject_label(&entry, SubjectState::SoftDeleted),
            "Blog Post # 42 (soft deleted)"
        );
        assert_eq!(
            subject_label(&entry, SubjectState::Missing),
            "Blog Post # 42 (deleted)"
        );

        let system = AuditEntryDraft::new(EventKind::Other("login".into())).into_entry(2, Utc::now());
        assert_eq!(subject_label(&system, SubjectState::Missing), "-");
    }

    #[test]
    fn labels_and_colors() {
        assert_eq!(log_name_label(Some("billing events")), "Billing Events");
        assert_eq!(log_name_label(None), "-");
        assert_eq!(log_name_label(Some("")), "-");
        assert_eq!(event_label(&EventKind::Restored), "Restored");
        assert_eq!(event_color(&EventKind::Deleted), "danger");
        assert_eq!(event_color(&EventKind::Other("login".into())), "primary");
        assert_eq!(causer_label(None), "\u{2014}");
        assert_eq!(causer_label(Some("Grace")), "Grace");
    }

    #[test]
    fn created_at_uses_format() {
        let at = Utc.with_ymd_and_hms(2024, 2, 9, 8, 5, 3).unwrap();
        assert_eq!(format_created_at(&at, "%b %-d, %Y %H:%M:%S"), "Feb 9, 2024 08:05:03");
    }

    #[test]
    fn created_at_falls_back_on_bad_format() {
        let at = Utc.with_ymd_and_hms(2024, 2, 9, 8, 5, 3).unwrap();
        assert_eq!(format_created_at(&at, "%Q"), "2024-02-09T08:05:03+00:00");
    }

    #[test]
    fn notices_for_field_restore() {
        let missing: Result<RestoreOutcome, RestoreError> = Err(RestoreError::EntryNotFound(3));
        assert_eq!(Notice::for_field_restore(&missing).title_key, "activity_not_found");

        let failed: Result<RestoreOutcome, RestoreError> =
            Err(RestoreError::failed(anyhow::anyhow!("disk full")));
        let notice = Notice::for_field_restore(&failed);
        assert_eq!(notice.level, NoticeLevel::Danger);
        assert_eq!(notice.body.as_deref(), Some("restore failed: disk full"));
    }

    #[test]
    fn notices_for_soft_delete_restore() {
        let refused: Result<RestoreOutcome, RestoreError> = Err(RestoreError::NotSoftDeleted);
        assert_eq!(
            Notice::for_soft_delete_restore(&refused).title_key,
            "unable_to_restore_this_model"
        );
    }
}
