//! Data models for activity log entries and the entities they describe.

pub mod entity;
pub mod entry;

pub use entity::Entity;
pub use entry::{
    AuditEntry, AuditEntryDraft, EntryId, EventKind, FieldMap, Properties, RestoreMetadata,
    SubjectRef,
};
