//! Storage collaborators consumed by the restore engine.
//!
//! The engine only ever reads and appends activity log entries; there is no
//! operation for editing or removing one. Entity access is generic over
//! subject type and includes soft-deleted rows.

mod memory;
mod suppression;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use suppression::{LogSuppression, SuppressionGuard};

use crate::models::{AuditEntry, AuditEntryDraft, Entity, EntryId, FieldMap, SubjectRef};
use crate::query::ActivityQuery;

/// Append-only activity log storage.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Look up an entry by id.
    async fn find(&self, id: EntryId) -> Result<Option<AuditEntry>>;

    /// Append a new entry and return it as stored.
    async fn append(&self, draft: AuditEntryDraft) -> Result<AuditEntry>;

    /// List entries matching `query`, sorted as it requests.
    async fn list(&self, query: &ActivityQuery) -> Result<Vec<AuditEntry>>;

    /// Suppression state honoured by automatic change logging.
    fn suppression(&self) -> &LogSuppression;
}

/// Generic entity access keyed by subject reference.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Resolve a subject, including soft-deleted entities.
    async fn resolve(&self, subject: &SubjectRef) -> Result<Option<Entity>>;

    /// Apply `fields` to the entity and return its new state.
    async fn update(&self, entity: &Entity, fields: &FieldMap) -> Result<Entity>;

    /// Whether the entity supports soft deletion.
    fn supports_soft_delete(&self, entity: &Entity) -> bool;

    /// Whether the entity is currently soft-deleted.
    fn is_soft_deleted(&self, entity: &Entity) -> bool;

    /// Clear the soft-delete mark and return the new state.
    async fn undelete(&self, entity: &Entity) -> Result<Entity>;

    /// Open a transaction covering entity and log writes made through it.
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// A unit of work over entities and the activity log.
///
/// Writes made through a transaction are visible to its own reads but to
/// no one else until [`commit`](Self::commit). Commit applies all of them
/// or none. Rolling back, or dropping the transaction uncommitted,
/// discards them. Each transaction is independent of any other open on
/// the same store.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Resolve a subject as this transaction sees it.
    async fn resolve(&mut self, subject: &SubjectRef) -> Result<Option<Entity>>;

    /// Clear the soft-delete mark and return the new state.
    async fn undelete(&mut self, entity: &Entity) -> Result<Entity>;

    /// Append a log entry and return it as it will be stored.
    async fn append(&mut self, draft: AuditEntryDraft) -> Result<AuditEntry>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
