//! Activity log test utilities.
//!
//! Fixture builders for entries, entities and actors, plus canned
//! collaborators (scripted oracles, a fault-injecting store) for exercising
//! restore failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use activitylog::{
    ActivityQuery, Actor, AuditEntry, AuditEntryDraft, AuditLogStore, AuthorizationOracle, Entity,
    EntityStore, EntryId, EventKind, FieldMap, LogSuppression, MemoryStore, Properties,
    StoreTransaction, SubjectRef,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Build a field map from a JSON object literal.
///
/// Panics if `value` is not an object.
pub fn field_map(value: JsonValue) -> FieldMap {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Create a soft-deletable `User` entity.
pub fn test_user(id: &str, fields: JsonValue) -> Entity {
    Entity::soft_deletable(SubjectRef::new("User", id), field_map(fields))
}

/// Create an entity without soft-delete support.
pub fn test_tag(id: &str, fields: JsonValue) -> Entity {
    Entity::new(SubjectRef::new("Tag", id), field_map(fields))
}

/// Create an actor holding `permissions`.
pub fn test_actor(id: &str, permissions: &[&str]) -> Actor {
    Actor::new(id).with_permissions(permissions)
}

/// Create an actor with every permission.
pub fn admin_actor() -> Actor {
    Actor::new("1")
        .with_name("Admin")
        .with_permissions(&[activitylog::auth::ADMINISTER_PERMISSION])
}

/// Start an entry fixture for `event`.
pub fn test_entry(event: EventKind) -> TestEntry {
    TestEntry {
        draft: AuditEntryDraft::new(event),
    }
}

/// A test entry builder.
#[derive(Debug, Clone)]
pub struct TestEntry {
    draft: AuditEntryDraft,
}

impl TestEntry {
    /// Set the subject.
    pub fn on(mut self, subject_type: &str, subject_id: &str) -> Self {
        self.draft.subject = Some(SubjectRef::new(subject_type, subject_id));
        self
    }

    /// Set the subject from an entity.
    pub fn on_entity(mut self, entity: &Entity) -> Self {
        self.draft.subject = Some(entity.subject.clone());
        self
    }

    /// Set the causer.
    pub fn by(mut self, causer_id: &str) -> Self {
        self.draft.causer_id = Some(causer_id.to_string());
        self
    }

    /// Set the prior-state snapshot.
    pub fn old(mut self, fields: JsonValue) -> Self {
        self.draft.properties.old = Some(field_map(fields));
        self
    }

    /// Set the new-state snapshot.
    pub fn attributes(mut self, fields: JsonValue) -> Self {
        self.draft.properties.attributes = Some(field_map(fields));
        self
    }

    /// Replace the whole property bag.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.draft.properties = properties;
        self
    }

    /// Set the log name.
    pub fn log_name(mut self, log_name: &str) -> Self {
        self.draft.log_name = Some(log_name.to_string());
        self
    }

    /// The draft as built.
    pub fn draft(self) -> AuditEntryDraft {
        self.draft
    }

    /// Append the entry to `store`.
    pub async fn append_to(self, store: &MemoryStore) -> AuditEntry {
        match store.append(self.draft).await {
            Ok(entry) => entry,
            Err(e) => panic!("failed to append test entry: {e:#}"),
        }
    }
}

/// What a [`ScriptedOracle`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleAnswer {
    Allow,
    Deny,
    Fail,
}

/// Oracle with a fixed answer that counts how often it is asked.
#[derive(Debug)]
pub struct ScriptedOracle {
    answer: OracleAnswer,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(answer: OracleAnswer) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn allow() -> Arc<Self> {
        Self::new(OracleAnswer::Allow)
    }

    pub fn deny() -> Arc<Self> {
        Self::new(OracleAnswer::Deny)
    }

    pub fn failing() -> Arc<Self> {
        Self::new(OracleAnswer::Fail)
    }

    /// Number of checks made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationOracle for ScriptedOracle {
    async fn can(&self, _actor: &Actor, action: &str, entity: &Entity) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            OracleAnswer::Allow => Ok(true),
            OracleAnswer::Deny => Ok(false),
            OracleAnswer::Fail => {
                anyhow::bail!("policy for {action} on {} is unavailable", entity.subject)
            }
        }
    }
}

/// Store operation a [`FaultyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Find,
    Append,
    Resolve,
    Update,
    Undelete,
    Begin,
    Commit,
}

#[derive(Default)]
struct FaultPlan {
    always: HashSet<Fault>,
    per_subject: HashSet<(Fault, SubjectRef)>,
    undelete_delays: HashMap<SubjectRef, Duration>,
}

impl FaultPlan {
    fn check(&self, fault: Fault, subject: Option<&SubjectRef>) -> anyhow::Result<()> {
        let targeted =
            subject.is_some_and(|s| self.per_subject.contains(&(fault, s.clone())));
        if self.always.contains(&fault) || targeted {
            anyhow::bail!("injected {fault:?} failure");
        }
        Ok(())
    }
}

/// A [`MemoryStore`] wrapper that fails or slows selected operations,
/// including those made through its transactions.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    plan: Arc<parking_lot::Mutex<FaultPlan>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            plan: Arc::default(),
        }
    }

    /// Make every future `fault` operation fail.
    pub fn fail_on(&self, fault: Fault) {
        self.plan.lock().always.insert(fault);
    }

    /// Make future `fault` operations on `subject` fail.
    pub fn fail_on_subject(&self, fault: Fault, subject: SubjectRef) {
        self.plan.lock().per_subject.insert((fault, subject));
    }

    /// Sleep for `delay` before every undelete of `subject`.
    pub fn delay_undelete(&self, subject: SubjectRef, delay: Duration) {
        self.plan.lock().undelete_delays.insert(subject, delay);
    }

    pub fn clear_faults(&self) {
        *self.plan.lock() = FaultPlan::default();
    }

    /// The wrapped store.
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, fault: Fault, subject: Option<&SubjectRef>) -> anyhow::Result<()> {
        self.plan.lock().check(fault, subject)
    }
}

async fn pause_before_undelete(plan: &parking_lot::Mutex<FaultPlan>, subject: &SubjectRef) {
    let delay = plan.lock().undelete_delays.get(subject).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl AuditLogStore for FaultyStore {
    async fn find(&self, id: EntryId) -> anyhow::Result<Option<AuditEntry>> {
        self.check(Fault::Find, None)?;
        self.inner.find(id).await
    }

    async fn append(&self, draft: AuditEntryDraft) -> anyhow::Result<AuditEntry> {
        self.check(Fault::Append, draft.subject.as_ref())?;
        self.inner.append(draft).await
    }

    async fn list(&self, query: &ActivityQuery) -> anyhow::Result<Vec<AuditEntry>> {
        self.inner.list(query).await
    }

    fn suppression(&self) -> &LogSuppression {
        self.inner.suppression()
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn resolve(&self, subject: &SubjectRef) -> anyhow::Result<Option<Entity>> {
        self.check(Fault::Resolve, Some(subject))?;
        self.inner.resolve(subject).await
    }

    async fn update(&self, entity: &Entity, fields: &FieldMap) -> anyhow::Result<Entity> {
        self.check(Fault::Update, Some(&entity.subject))?;
        self.inner.update(entity, fields).await
    }

    fn supports_soft_delete(&self, entity: &Entity) -> bool {
        self.inner.supports_soft_delete(entity)
    }

    fn is_soft_deleted(&self, entity: &Entity) -> bool {
        self.inner.is_soft_deleted(entity)
    }

    async fn undelete(&self, entity: &Entity) -> anyhow::Result<Entity> {
        pause_before_undelete(&self.plan, &entity.subject).await;
        self.check(Fault::Undelete, Some(&entity.subject))?;
        self.inner.undelete(entity).await
    }

    async fn begin_transaction(&self) -> anyhow::Result<Box<dyn StoreTransaction>> {
        self.check(Fault::Begin, None)?;
        let inner = self.inner.begin_transaction().await?;
        Ok(Box::new(FaultyTransaction {
            inner,
            plan: self.plan.clone(),
        }))
    }
}

/// Transaction of a [`FaultyStore`]. A failed commit discards the
/// wrapped transaction.
struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    plan: Arc<parking_lot::Mutex<FaultPlan>>,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn resolve(&mut self, subject: &SubjectRef) -> anyhow::Result<Option<Entity>> {
        self.plan.lock().check(Fault::Resolve, Some(subject))?;
        self.inner.resolve(subject).await
    }

    async fn undelete(&mut self, entity: &Entity) -> anyhow::Result<Entity> {
        pause_before_undelete(&self.plan, &entity.subject).await;
        self.plan.lock().check(Fault::Undelete, Some(&entity.subject))?;
        self.inner.undelete(entity).await
    }

    async fn append(&mut self, draft: AuditEntryDraft) -> anyhow::Result<AuditEntry> {
        self.plan.lock().check(Fault::Append, draft.subject.as_ref())?;
        self.inner.append(draft).await
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.plan.lock().check(Fault::Commit, None)?;
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.rollback().await
    }
}
