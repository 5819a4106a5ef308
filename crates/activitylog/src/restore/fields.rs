//! Field restore: write an entry's `old` snapshot back onto its subject.
//!
//! There is no transaction or lock around this path. It reads the subject,
//! writes the snapshot, then appends the `restored` entry; a concurrent
//! write to the same subject between those steps is not detected, and a
//! failed append leaves the subject updated without a matching entry.

use anyhow::Context;
use tracing::{debug, info};

use super::{RestoreEngine, RestoreOutcome};
use crate::error::{RestoreError, RestoreResult};
use crate::models::{AuditEntryDraft, EntryId, EventKind, Properties};

impl RestoreEngine {
    /// Revert the subject of `entry_id` to the entry's `old` snapshot.
    ///
    /// When an actor is present a `restored` entry is appended with
    /// `attributes` set to the values written and `old` set to the entry's
    /// `attributes`, so restoring that entry undoes this restore. Without an
    /// actor the subject is still updated but nothing is logged.
    pub async fn restore_fields(&self, entry_id: EntryId) -> RestoreResult<RestoreOutcome> {
        let entry = self.find_entry(entry_id).await?;

        let Some(old) = entry.properties.old.clone() else {
            debug!(entry = entry_id, "no previous properties to restore");
            return Err(RestoreError::NoPriorState);
        };
        let new_properties = entry.properties.attributes.clone();

        let subject = entry.subject.clone().ok_or(RestoreError::SubjectNotFound)?;
        let entity = self
            .inner
            .entities
            .resolve(&subject)
            .await
            .with_context(|| format!("failed to resolve subject {subject}"))
            .map_err(RestoreError::failed)?
            .ok_or(RestoreError::SubjectNotFound)?;

        let updated = self
            .inner
            .log
            .suppression()
            .scope(self.inner.entities.update(&entity, &old))
            .await
            .with_context(|| format!("failed to update subject {subject}"))
            .map_err(RestoreError::failed)?;

        let logged = match self.inner.actors.current() {
            Some(actor) => {
                let draft = AuditEntryDraft::new(EventKind::Restored)
                    .performed_on(subject.clone())
                    .caused_by_actor(actor)
                    .with_properties(Properties::change(new_properties, Some(old)));
                let appended = self
                    .inner
                    .log
                    .append(draft)
                    .await
                    .context("failed to log restore")
                    .map_err(RestoreError::failed)?;
                Some(appended)
            }
            None => {
                debug!(entry = entry_id, "no actor present, restore not logged");
                None
            }
        };

        info!(
            entry = entry_id,
            subject = %subject,
            logged = logged.as_ref().map(|e| e.id),
            "activity restored"
        );

        Ok(RestoreOutcome {
            entity: updated,
            logged,
        })
    }
}
