#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Builds a [`RestoreEngine`] over a fault-injecting in-memory store so
//! tests can drive the real restore paths and then inspect store state.

#![allow(dead_code)]

use std::sync::Arc;

use activitylog::{
    Actor, AuditEntry, Collaborators, Entity, FixedActor, MemoryStore, ResourceRegistry,
    RestoreEngine, RestoreSettings, SubjectRef,
};
use activitylog_test_utils::{FaultyStore, ScriptedOracle, admin_actor};

/// Engine plus the collaborators it was built from.
pub struct TestApp {
    pub store: FaultyStore,
    pub oracle: Arc<ScriptedOracle>,
    pub resources: ResourceRegistry,
    pub engine: RestoreEngine,
}

impl TestApp {
    /// Admin actor, permissive oracle, default settings.
    pub fn new() -> Self {
        Self::with(Some(admin_actor()), ScriptedOracle::allow(), RestoreSettings::default())
    }

    /// No authenticated actor.
    pub fn anonymous() -> Self {
        Self::with(None, ScriptedOracle::allow(), RestoreSettings::default())
    }

    pub fn with(
        actor: Option<Actor>,
        oracle: Arc<ScriptedOracle>,
        settings: RestoreSettings,
    ) -> Self {
        let store = FaultyStore::new(MemoryStore::new());
        let resources = ResourceRegistry::new("admin");
        resources.register("User");
        resources.register("Tag");

        let collaborators = Collaborators {
            log: Arc::new(store.clone()),
            entities: Arc::new(store.clone()),
            oracle: oracle.clone(),
            actors: Arc::new(FixedActor(actor)),
        };
        let engine = RestoreEngine::new(collaborators, resources.clone(), settings);

        Self {
            store,
            oracle,
            resources,
            engine,
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        self.store.memory()
    }

    /// Insert an entity without logging its creation.
    pub async fn seed(&self, entity: Entity) -> Entity {
        let memory = self.memory();
        let _quiet = activitylog::AuditLogStore::suppression(memory).enter();
        memory.create(entity).await.unwrap()
    }

    /// Insert an entity and soft-delete it, returning the `deleted` entry.
    pub async fn seed_deleted(&self, entity: Entity) -> AuditEntry {
        let entity = self.seed(entity).await;
        self.memory().soft_delete(&entity.subject).await.unwrap();
        self.memory()
            .entries()
            .into_iter()
            .rev()
            .find(|e| e.subject.as_ref() == Some(&entity.subject))
            .unwrap()
    }

    pub fn entity(&self, subject: &SubjectRef) -> Entity {
        self.memory().entity(subject).unwrap()
    }

    /// Entries and entity state, for before/after comparisons.
    pub fn snapshot(&self, subject: &SubjectRef) -> (Vec<AuditEntry>, Option<Entity>) {
        (self.memory().entries(), self.memory().entity(subject))
    }
}
