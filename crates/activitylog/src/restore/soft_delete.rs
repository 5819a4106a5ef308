//! Soft-delete restore: undelete the subject of a `deleted` entry.

use anyhow::Context;
use tracing::{info, warn};

use super::{RestoreEngine, RestoreOutcome};
use crate::error::{RestoreError, RestoreResult};
use crate::models::{
    AuditEntry, AuditEntryDraft, Entity, EntryId, EventKind, Properties, RestoreMetadata,
};
use crate::store::StoreTransaction;

/// Authorization action checked before undeleting.
pub const RESTORE_ACTION: &str = "restore";

impl RestoreEngine {
    /// Whether the subject of `entry_id` can be restored from soft delete.
    pub async fn can_restore_from_soft_delete(&self, entry_id: EntryId) -> bool {
        self.soft_delete_eligibility(entry_id).await.is_ok()
    }

    /// The soft-delete precondition with the reason it does not hold.
    ///
    /// Returns the resolved, soft-deleted subject on success. The checks,
    /// in order:
    ///
    /// 1. soft-delete restore is enabled,
    /// 2. the entry records a deletion,
    /// 3. the subject resolves (lookup errors count as unresolved),
    /// 4. the subject supports soft deletion and is currently deleted,
    /// 5. the acting user, if any, may `restore` it. Oracle errors are
    ///    decided by the configured [`OracleFailurePolicy`](crate::OracleFailurePolicy).
    ///
    /// Without an actor the restore is permitted.
    pub async fn soft_delete_eligibility(&self, entry_id: EntryId) -> RestoreResult<Entity> {
        let entry = self.find_entry(entry_id).await?;
        self.check_soft_delete(&entry).await
    }

    async fn check_soft_delete(&self, entry: &AuditEntry) -> RestoreResult<Entity> {
        if self.inner.settings.soft_delete_restore_disabled {
            return Err(RestoreError::RestoreDisabled);
        }

        if entry.event != EventKind::Deleted {
            return Err(RestoreError::NotSoftDeleted);
        }

        let subject = entry.subject.as_ref().ok_or(RestoreError::SubjectNotFound)?;
        let entity = self
            .resolve_quietly(subject)
            .await
            .ok_or(RestoreError::SubjectNotFound)?;

        let entities = &self.inner.entities;
        if !entities.supports_soft_delete(&entity) || !entities.is_soft_deleted(&entity) {
            return Err(RestoreError::NotSoftDeleted);
        }

        if let Some(actor) = self.inner.actors.current() {
            let allowed = match self.inner.oracle.can(&actor, RESTORE_ACTION, &entity).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    let policy = self.inner.settings.oracle_failure;
                    warn!(
                        entry = entry.id,
                        subject = %subject,
                        error = %e,
                        ?policy,
                        "authorization check failed"
                    );
                    policy.decide()
                }
            };
            if !allowed {
                return Err(RestoreError::Unauthorized);
            }
        }

        Ok(entity)
    }

    /// Undelete the subject of `entry_id`.
    ///
    /// The undelete, the re-read of the subject, and the `restored` entry
    /// go through one store transaction; any failure discards all of it.
    /// Concurrent restores of the same subject are serialized and the
    /// precondition is re-checked once the subject lock is held.
    pub async fn restore_from_soft_delete(
        &self,
        entry_id: EntryId,
    ) -> RestoreResult<RestoreOutcome> {
        let entry = self.find_entry(entry_id).await?;
        let subject = self.check_soft_delete(&entry).await?.subject;

        let lock = self.subject_lock(&subject);
        let result = {
            let _held = lock.lock().await;
            match self.check_soft_delete(&entry).await {
                Ok(entity) => self.undelete_atomically(&entry, &entity).await,
                Err(e) => Err(e),
            }
        };
        drop(lock);
        self.release_subject_lock(&subject);

        if let Ok(outcome) = &result {
            info!(
                entry = entry_id,
                subject = %subject,
                logged = outcome.logged.as_ref().map(|e| e.id),
                "subject restored from soft delete"
            );
        }
        result
    }

    async fn undelete_atomically(
        &self,
        entry: &AuditEntry,
        entity: &Entity,
    ) -> RestoreResult<RestoreOutcome> {
        let mut tx = self
            .inner
            .entities
            .begin_transaction()
            .await
            .context("failed to begin transaction")
            .map_err(RestoreError::failed)?;

        let outcome = match self.undelete_and_log(tx.as_mut(), entry, entity).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(entry = entry.id, error = %rollback, "rollback failed");
                }
                return Err(RestoreError::failed(e));
            }
        };

        tx.commit()
            .await
            .context("failed to commit restore")
            .map_err(RestoreError::failed)?;
        Ok(outcome)
    }

    async fn undelete_and_log(
        &self,
        tx: &mut dyn StoreTransaction,
        entry: &AuditEntry,
        entity: &Entity,
    ) -> anyhow::Result<RestoreOutcome> {
        let before = entity.snapshot();

        self.inner
            .log
            .suppression()
            .scope(tx.undelete(entity))
            .await
            .with_context(|| format!("failed to undelete {}", entity.subject))?;

        let refreshed = tx
            .resolve(&entity.subject)
            .await
            .with_context(|| format!("failed to reload {}", entity.subject))?
            .with_context(|| format!("{} disappeared during restore", entity.subject))?;
        let after = refreshed.snapshot();

        let logged = match self.inner.actors.current() {
            Some(actor) => {
                let properties = Properties {
                    restore_metadata: Some(RestoreMetadata::soft_delete(entry.id)),
                    ..Properties::change(Some(before), Some(after))
                };
                let draft = AuditEntryDraft::new(EventKind::Restored)
                    .performed_on(entity.subject.clone())
                    .caused_by_actor(actor)
                    .with_properties(properties);
                Some(tx.append(draft).await.context("failed to log restore")?)
            }
            None => None,
        };

        Ok(RestoreOutcome {
            entity: refreshed,
            logged,
        })
    }
}
