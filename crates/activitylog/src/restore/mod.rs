//! Restore engine.
//!
//! Two operations revert a subject to an earlier state recorded in the
//! activity log:
//!
//! - **Field restore** writes an entry's `old` snapshot back onto its
//!   subject and logs the inverse change as a `restored` entry.
//! - **Soft-delete restore** undeletes the subject of a `deleted` entry
//!   inside a transaction, logging before/after snapshots with restore
//!   metadata.
//!
//! Writes made on behalf of a restore run with automatic activity logging
//! suppressed, so only the explicit `restored` entry appears. Collaborator
//! failures never escape as panics or raw errors; they are reported as a
//! [`RestoreError`](crate::RestoreError).

mod access;
mod fields;
mod soft_delete;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::auth::{ActorContext, AuthorizationOracle, OracleFailurePolicy};
use crate::config::Config;
use crate::error::{RestoreError, RestoreResult};
use crate::models::{AuditEntry, Entity, EntryId, SubjectRef};
use crate::resource::ResourceRegistry;
use crate::store::{AuditLogStore, EntityStore};

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    /// Subject state after the restore.
    pub entity: Entity,
    /// The `restored` entry, or `None` when no actor was present to
    /// attribute it to.
    pub logged: Option<AuditEntry>,
}

/// Switches that gate restore actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreSettings {
    pub restore_action_hidden: bool,
    pub resource_action_hidden: bool,
    pub soft_delete_restore_disabled: bool,
    pub oracle_failure: OracleFailurePolicy,
}

impl From<&Config> for RestoreSettings {
    fn from(config: &Config) -> Self {
        Self {
            restore_action_hidden: config.restore_action_hidden,
            resource_action_hidden: config.resource_action_hidden,
            soft_delete_restore_disabled: config.restore_model_action_hidden,
            oracle_failure: config.authorization_failure,
        }
    }
}

/// The collaborators a restore engine works against.
#[derive(Clone)]
pub struct Collaborators {
    pub log: Arc<dyn AuditLogStore>,
    pub entities: Arc<dyn EntityStore>,
    pub oracle: Arc<dyn AuthorizationOracle>,
    pub actors: Arc<dyn ActorContext>,
}

/// Restores subjects from activity log entries.
#[derive(Clone)]
pub struct RestoreEngine {
    inner: Arc<RestoreEngineInner>,
}

struct RestoreEngineInner {
    log: Arc<dyn AuditLogStore>,
    entities: Arc<dyn EntityStore>,
    oracle: Arc<dyn AuthorizationOracle>,
    actors: Arc<dyn ActorContext>,
    resources: ResourceRegistry,
    settings: RestoreSettings,
    /// Serializes soft-delete restores per subject.
    subject_locks: DashMap<SubjectRef, Arc<tokio::sync::Mutex<()>>>,
}

impl RestoreEngine {
    /// Create a restore engine.
    pub fn new(
        collaborators: Collaborators,
        resources: ResourceRegistry,
        settings: RestoreSettings,
    ) -> Self {
        let Collaborators {
            log,
            entities,
            oracle,
            actors,
        } = collaborators;

        Self {
            inner: Arc::new(RestoreEngineInner {
                log,
                entities,
                oracle,
                actors,
                resources,
                settings,
                subject_locks: DashMap::new(),
            }),
        }
    }

    pub fn settings(&self) -> &RestoreSettings {
        &self.inner.settings
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.inner.resources
    }

    /// Look up an entry, mapping absence to `EntryNotFound`.
    async fn find_entry(&self, entry_id: EntryId) -> RestoreResult<AuditEntry> {
        match self.inner.log.find(entry_id).await {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Err(RestoreError::EntryNotFound(entry_id)),
            Err(e) => Err(RestoreError::failed(
                e.context(format!("failed to load activity {entry_id}")),
            )),
        }
    }

    /// Resolve a subject, treating lookup failures as "not available".
    async fn resolve_quietly(&self, subject: &SubjectRef) -> Option<Entity> {
        match self.inner.entities.resolve(subject).await {
            Ok(entity) => entity,
            Err(e) => {
                debug!(subject = %subject, error = %e, "subject resolution failed");
                None
            }
        }
    }

    fn subject_lock(&self, subject: &SubjectRef) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .subject_locks
            .entry(subject.clone())
            .or_default()
            .clone()
    }

    /// Drop the lock for `subject` once nobody else holds a handle to it.
    fn release_subject_lock(&self, subject: &SubjectRef) {
        self.inner
            .subject_locks
            .remove_if(subject, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for RestoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreEngine")
            .field("settings", &self.inner.settings)
            .field("resources", &self.inner.resources)
            .finish()
    }
}
