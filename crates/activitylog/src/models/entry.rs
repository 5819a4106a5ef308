//! Activity log entry model.
//!
//! Entries are immutable once appended. Restores never touch an existing
//! entry; they append a new `restored` entry carrying the inverse snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Actor;

/// Activity log entry identifier.
pub type EntryId = i64;

/// Field name to value mapping. Values may be nested.
pub type FieldMap = serde_json::Map<String, Value>;

/// Reference to the entity an entry describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectRef {
    /// Entity type identifier (e.g. `App\Models\User`).
    pub subject_type: String,
    /// Entity identifier within its type.
    pub subject_id: String,
}

impl SubjectRef {
    /// Create a subject reference.
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.subject_type, self.subject_id)
    }
}

/// Kind of change an entry records.
///
/// The known kinds are a closed set, but stored logs may carry other event
/// names; those are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Restored,
    Draft,
    Other(String),
}

impl EventKind {
    /// The stored event name.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
            EventKind::Restored => "restored",
            EventKind::Draft => "draft",
            EventKind::Other(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "created" => EventKind::Created,
            "updated" => EventKind::Updated,
            "deleted" => EventKind::Deleted,
            "restored" => EventKind::Restored,
            "draft" => EventKind::Draft,
            _ => EventKind::Other(value),
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        EventKind::from(value.to_string())
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance attached to entries written by a soft-delete restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreMetadata {
    pub restored_from_soft_delete: bool,
    pub original_activity_id: EntryId,
    pub restore_type: String,
}

impl RestoreMetadata {
    /// Metadata for a restore of the subject of `original_activity_id`.
    pub fn soft_delete(original_activity_id: EntryId) -> Self {
        Self {
            restored_from_soft_delete: true,
            original_activity_id,
            restore_type: "soft_delete".to_string(),
        }
    }
}

/// Property bag of an entry.
///
/// `old` is the state before the change, `attributes` the state after it.
/// Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<FieldMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<FieldMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_metadata: Option<RestoreMetadata>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl Properties {
    /// Properties describing a change from `old` to `attributes`.
    pub fn change(old: Option<FieldMap>, attributes: Option<FieldMap>) -> Self {
        Self {
            old,
            attributes,
            ..Self::default()
        }
    }

    /// Whether there is nothing in the bag.
    pub fn is_empty(&self) -> bool {
        self.old.is_none()
            && self.attributes.is_none()
            && self.restore_metadata.is_none()
            && self.extra.is_empty()
    }
}

/// A stored activity log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: EntryId,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subject: Option<SubjectRef>,
    #[serde(default)]
    pub causer_id: Option<String>,
    /// Display name of the causer when it was known at logging time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causer_name: Option<String>,
    pub event: EventKind,
    #[serde(default)]
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// The prior-state snapshot, if any.
    pub fn old(&self) -> Option<&FieldMap> {
        self.properties.old.as_ref()
    }

    /// The new-state snapshot, if any.
    pub fn attributes(&self) -> Option<&FieldMap> {
        self.properties.attributes.as_ref()
    }
}

/// An entry that has not been appended yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntryDraft {
    pub log_name: Option<String>,
    pub description: String,
    pub subject: Option<SubjectRef>,
    pub causer_id: Option<String>,
    pub causer_name: Option<String>,
    pub event: EventKind,
    pub properties: Properties,
}

impl AuditEntryDraft {
    /// Start a draft for the given event. The description defaults to the
    /// event name.
    pub fn new(event: EventKind) -> Self {
        Self {
            log_name: Some("default".to_string()),
            description: event.as_str().to_string(),
            subject: None,
            causer_id: None,
            causer_name: None,
            event,
            properties: Properties::default(),
        }
    }

    pub fn performed_on(mut self, subject: SubjectRef) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn caused_by(mut self, causer_id: impl Into<String>) -> Self {
        self.causer_id = Some(causer_id.into());
        self
    }

    /// Attribute the entry to `actor`, keeping its name for display.
    pub fn caused_by_actor(mut self, actor: Actor) -> Self {
        self.causer_id = Some(actor.id);
        self.causer_name = actor.name;
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn log_name(mut self, log_name: impl Into<String>) -> Self {
        self.log_name = Some(log_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Turn the draft into a stored entry.
    pub fn into_entry(self, id: EntryId, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            log_name: self.log_name,
            description: self.description,
            subject: self.subject,
            causer_id: self.causer_id,
            causer_name: self.causer_name,
            event: self.event,
            properties: self.properties,
            created_at,
        }
    }
}
