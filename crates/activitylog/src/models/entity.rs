//! Domain entity as seen by the restore engine.
//!
//! The engine treats entities as opaque field maps addressed by
//! [`SubjectRef`]. Soft-deletable entities carry a `deleted_at` stamp.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::{FieldMap, SubjectRef};

/// A stored domain entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub subject: SubjectRef,
    #[serde(default)]
    pub fields: FieldMap,
    /// Whether the entity type supports soft deletion.
    #[serde(default)]
    pub soft_deletes: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// Create an entity that is hard-deleted when removed.
    pub fn new(subject: SubjectRef, fields: FieldMap) -> Self {
        Self {
            subject,
            fields,
            soft_deletes: false,
            deleted_at: None,
        }
    }

    /// Create an entity that supports soft deletion.
    pub fn soft_deletable(subject: SubjectRef, fields: FieldMap) -> Self {
        Self {
            soft_deletes: true,
            ..Self::new(subject, fields)
        }
    }

    /// Whether the entity is currently soft-deleted.
    pub fn trashed(&self) -> bool {
        self.soft_deletes && self.deleted_at.is_some()
    }

    /// Merge `changes` into the field map, returning the replaced values of
    /// keys that actually changed.
    pub fn apply(&mut self, changes: &FieldMap) -> FieldMap {
        let mut replaced = FieldMap::new();
        for (key, value) in changes {
            let previous = self.fields.insert(key.clone(), value.clone());
            if previous.as_ref() != Some(value) {
                replaced.insert(key.clone(), previous.unwrap_or(Value::Null));
            }
        }
        replaced
    }

    /// Full array form: `id`, every field, and `deleted_at` for
    /// soft-deletable entities.
    pub fn snapshot(&self) -> FieldMap {
        let mut out = FieldMap::new();
        out.insert(
            "id".to_string(),
            Value::String(self.subject.subject_id.clone()),
        );
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        if self.soft_deletes {
            let stamp = self
                .deleted_at
                .map(|at| Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true)))
                .unwrap_or(Value::Null);
            out.insert("deleted_at".to_string(), stamp);
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn apply_reports_only_changed_keys() {
        let mut entity = Entity::new(
            SubjectRef::new("Post", "1"),
            fields(json!({"title": "a", "status": "draft"})),
        );

        let replaced = entity.apply(&fields(json!({"title": "a", "status": "live", "slug": "x"})));

        assert_eq!(replaced, fields(json!({"status": "draft", "slug": null})));
        assert_eq!(entity.fields["status"], json!("live"));
    }

    #[test]
    fn snapshot_includes_deleted_at_for_soft_deletes() {
        let mut entity = Entity::soft_deletable(SubjectRef::new("User", "42"), FieldMap::new());
        assert_eq!(entity.snapshot()["deleted_at"], Value::Null);

        entity.deleted_at = Some(Utc::now());
        assert!(entity.trashed());
        assert!(entity.snapshot()["deleted_at"].is_string());
        assert_eq!(entity.snapshot()["id"], json!("42"));
    }

    #[test]
    fn hard_delete_entities_never_report_trashed() {
        let mut entity = Entity::new(SubjectRef::new("Tag", "3"), FieldMap::new());
        entity.deleted_at = Some(Utc::now());
        assert!(!entity.trashed());
        assert!(!entity.snapshot().contains_key("deleted_at"));
    }
}
