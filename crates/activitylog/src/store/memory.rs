//! In-memory entity and activity log storage.
//!
//! Both collaborator traits are served from one shared state, so a
//! transaction opened through [`EntityStore::begin_transaction`] covers
//! entity writes and log appends alike. Transactions stage their writes
//! privately and apply them in one step on commit. Entity writes are
//! instrumented the way an activity-logging model is: every create,
//! update, delete and undelete appends an entry unless logging is
//! suppressed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AuditLogStore, EntityStore, LogSuppression, StoreTransaction};
use crate::models::{
    AuditEntry, AuditEntryDraft, Entity, EntryId, EventKind, FieldMap, Properties, SubjectRef,
};
use crate::query::ActivityQuery;

/// In-memory store for entities and their activity log.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    state: Mutex<StoreState>,
    open_transactions: AtomicUsize,
    suppression: LogSuppression,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    entities: BTreeMap<SubjectRef, Entity>,
    entries: Vec<AuditEntry>,
    next_id: EntryId,
}

/// On-disk form of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    entries: Vec<AuditEntry>,
}

impl StoreState {
    fn reserve_id(&mut self) -> EntryId {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push(&mut self, draft: AuditEntryDraft) -> AuditEntry {
        let entry = draft.into_entry(self.reserve_id(), Utc::now());
        self.entries.push(entry.clone());
        entry
    }

    /// Insert an entry whose id was reserved earlier, keeping id order.
    fn insert_reserved(&mut self, entry: AuditEntry) {
        let at = self.entries.partition_point(|e| e.id < entry.id);
        self.entries.insert(at, entry);
    }

    fn from_persisted(persisted: PersistedState) -> Self {
        let next_id = persisted.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        Self {
            entities: persisted
                .entities
                .into_iter()
                .map(|entity| (entity.subject.clone(), entity))
                .collect(),
            entries: persisted.entries,
            next_id,
        }
    }

    fn to_persisted(&self) -> PersistedState {
        PersistedState {
            entities: self.entities.values().cloned().collect(),
            entries: self.entries.clone(),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON state file. A missing file yields an empty
    /// store.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .context("failed to check state file")?
        {
            debug!(path = %path.display(), "state file not found, starting empty");
            return Ok(Self::new());
        }

        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        let persisted: PersistedState = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse state file {}", path.display()))?;

        let store = Self::new();
        *store.inner.state.lock() = StoreState::from_persisted(persisted);
        info!(
            path = %path.display(),
            entries = store.entry_count(),
            "state file loaded"
        );
        Ok(store)
    }

    /// Write the store to a JSON state file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let persisted = self.inner.state.lock().to_persisted();
        let json = serde_json::to_vec_pretty(&persisted).context("serialize state")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create state directory")?;
        }
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write state file {}", path.display()))?;

        debug!(path = %path.display(), "state file written");
        Ok(())
    }

    /// Insert a new entity and log its creation.
    pub async fn create(&self, entity: Entity) -> Result<Entity> {
        let mut state = self.inner.state.lock();
        if state.entities.contains_key(&entity.subject) {
            bail!("entity {} already exists", entity.subject);
        }

        state
            .entities
            .insert(entity.subject.clone(), entity.clone());
        self.record(
            &mut state,
            EventKind::Created,
            &entity.subject,
            Properties::change(None, Some(entity.snapshot())),
        );
        Ok(entity)
    }

    /// Mark an entity as soft-deleted and log the deletion.
    pub async fn soft_delete(&self, subject: &SubjectRef) -> Result<Entity> {
        let mut state = self.inner.state.lock();
        let entity = state
            .entities
            .get_mut(subject)
            .with_context(|| format!("entity {subject} not found"))?;

        if !entity.soft_deletes {
            bail!("entity {subject} does not support soft deletion");
        }
        if entity.trashed() {
            bail!("entity {subject} is already deleted");
        }

        entity.deleted_at = Some(Utc::now());
        let deleted = entity.clone();
        self.record(
            &mut state,
            EventKind::Deleted,
            subject,
            Properties::change(None, Some(deleted.snapshot())),
        );
        Ok(deleted)
    }

    /// All entries in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.state.lock().entries.clone()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Current state of an entity, if present.
    pub fn entity(&self, subject: &SubjectRef) -> Option<Entity> {
        self.inner.state.lock().entities.get(subject).cloned()
    }

    /// Number of transactions begun and not yet committed or discarded.
    pub fn open_transactions(&self) -> usize {
        self.inner.open_transactions.load(Ordering::SeqCst)
    }

    /// Append an automatic change entry unless logging is suppressed.
    fn record(
        &self,
        state: &mut StoreState,
        event: EventKind,
        subject: &SubjectRef,
        properties: Properties,
    ) {
        if self.inner.suppression.is_active() {
            debug!(subject = %subject, event = %event, "activity logging suppressed, entry dropped");
            return;
        }

        let entry = state.push(
            AuditEntryDraft::new(event)
                .performed_on(subject.clone())
                .with_properties(properties),
        );
        debug!(id = entry.id, subject = %subject, event = %entry.event, "activity logged");
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryStore")
            .field("entities", &state.entities.len())
            .field("entries", &state.entries.len())
            .finish()
    }
}

#[async_trait]
impl AuditLogStore for MemoryStore {
    async fn find(&self, id: EntryId) -> Result<Option<AuditEntry>> {
        let state = self.inner.state.lock();
        Ok(state.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn append(&self, draft: AuditEntryDraft) -> Result<AuditEntry> {
        let entry = self.inner.state.lock().push(draft);
        debug!(id = entry.id, event = %entry.event, "activity appended");
        Ok(entry)
    }

    async fn list(&self, query: &ActivityQuery) -> Result<Vec<AuditEntry>> {
        let entries = self.inner.state.lock().entries.clone();
        Ok(query.apply(entries))
    }

    fn suppression(&self) -> &LogSuppression {
        &self.inner.suppression
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn resolve(&self, subject: &SubjectRef) -> Result<Option<Entity>> {
        Ok(self.entity(subject))
    }

    async fn update(&self, entity: &Entity, fields: &FieldMap) -> Result<Entity> {
        let mut state = self.inner.state.lock();
        let stored = state
            .entities
            .get_mut(&entity.subject)
            .with_context(|| format!("entity {} not found", entity.subject))?;

        let replaced = stored.apply(fields);
        let updated = stored.clone();

        if !replaced.is_empty() {
            let attributes = replaced
                .keys()
                .filter_map(|k| updated.fields.get(k).map(|v| (k.clone(), v.clone())))
                .collect();
            self.record(
                &mut state,
                EventKind::Updated,
                &entity.subject,
                Properties::change(Some(replaced), Some(attributes)),
            );
        }
        Ok(updated)
    }

    fn supports_soft_delete(&self, entity: &Entity) -> bool {
        entity.soft_deletes
    }

    fn is_soft_deleted(&self, entity: &Entity) -> bool {
        entity.trashed()
    }

    async fn undelete(&self, entity: &Entity) -> Result<Entity> {
        let mut state = self.inner.state.lock();
        let stored = state
            .entities
            .get_mut(&entity.subject)
            .with_context(|| format!("entity {} not found", entity.subject))?;

        if !stored.trashed() {
            bail!("entity {} is not soft-deleted", entity.subject);
        }

        let before = stored.snapshot();
        stored.deleted_at = None;
        let restored = stored.clone();
        self.record(
            &mut state,
            EventKind::Restored,
            &entity.subject,
            Properties::change(Some(before), Some(restored.snapshot())),
        );
        Ok(restored)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>> {
        let open = self.inner.open_transactions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(open, "transaction started");
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            undeleted: BTreeMap::new(),
            entries: Vec::new(),
        }))
    }
}

/// Transaction over a [`MemoryStore`].
///
/// Entry ids are reserved when an entry is staged, so a discarded
/// transaction leaves a gap in the id sequence.
struct MemoryTransaction {
    store: MemoryStore,
    /// Subjects undeleted here, as this transaction sees them.
    undeleted: BTreeMap<SubjectRef, Entity>,
    entries: Vec<AuditEntry>,
}

impl MemoryTransaction {
    fn stage(&mut self, draft: AuditEntryDraft) -> AuditEntry {
        let id = self.store.inner.state.lock().reserve_id();
        let entry = draft.into_entry(id, Utc::now());
        self.entries.push(entry.clone());
        entry
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn resolve(&mut self, subject: &SubjectRef) -> Result<Option<Entity>> {
        match self.undeleted.get(subject) {
            Some(entity) => Ok(Some(entity.clone())),
            None => Ok(self.store.entity(subject)),
        }
    }

    async fn undelete(&mut self, entity: &Entity) -> Result<Entity> {
        let current = self
            .resolve(&entity.subject)
            .await?
            .with_context(|| format!("entity {} not found", entity.subject))?;
        if !current.trashed() {
            bail!("entity {} is not soft-deleted", entity.subject);
        }

        let before = current.snapshot();
        let restored = Entity {
            deleted_at: None,
            ..current
        };

        if self.store.inner.suppression.is_active() {
            debug!(subject = %entity.subject, "activity logging suppressed, entry dropped");
        } else {
            self.stage(
                AuditEntryDraft::new(EventKind::Restored)
                    .performed_on(entity.subject.clone())
                    .with_properties(Properties::change(Some(before), Some(restored.snapshot()))),
            );
        }

        self.undeleted
            .insert(entity.subject.clone(), restored.clone());
        Ok(restored)
    }

    async fn append(&mut self, draft: AuditEntryDraft) -> Result<AuditEntry> {
        let entry = self.stage(draft);
        debug!(id = entry.id, event = %entry.event, "activity staged");
        Ok(entry)
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let entries = std::mem::take(&mut self.entries);
        let staged = entries.len();
        let mut state = self.store.inner.state.lock();

        for subject in self.undeleted.keys() {
            match state.entities.get(subject) {
                Some(stored) if stored.trashed() => {}
                Some(_) => bail!("entity {subject} was restored by another writer"),
                None => bail!("entity {subject} disappeared before commit"),
            }
        }

        for subject in self.undeleted.keys() {
            if let Some(stored) = state.entities.get_mut(subject) {
                stored.deleted_at = None;
            }
        }
        for entry in entries {
            state.insert_reserved(entry);
        }

        debug!(
            undeleted = self.undeleted.len(),
            entries = staged,
            "transaction committed"
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!(
            undeleted = self.undeleted.len(),
            entries = self.entries.len(),
            "transaction rolled back"
        );
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.store
            .inner
            .open_transactions
            .fetch_sub(1, Ordering::SeqCst);
    }
}
