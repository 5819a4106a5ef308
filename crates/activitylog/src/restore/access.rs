//! Visibility checks for restore and resource actions.
//!
//! Unlike the soft-delete precondition, these checks fail closed: any
//! error while resolving or authorizing hides the action.

use tracing::debug;

use super::RestoreEngine;
use crate::models::{AuditEntry, Entity};
use crate::presentation::SubjectState;
use crate::resource::ResourceRoute;

/// Authorization action required to view or edit a subject.
pub const UPDATE_ACTION: &str = "update";

impl RestoreEngine {
    /// Whether the current actor may open the entry's subject for editing.
    pub async fn can_view_subject(&self, entry: &AuditEntry) -> bool {
        let Some(actor) = self.inner.actors.current() else {
            return false;
        };

        let target = match self.view_target(entry).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return false,
            Err(e) => {
                debug!(entry = entry.id, error = %e, "could not resolve subject for viewing");
                return false;
            }
        };

        match self.inner.oracle.can(&actor, UPDATE_ACTION, &target).await {
            Ok(allowed) => allowed,
            Err(e) => {
                debug!(entry = entry.id, error = %e, "view authorization failed");
                false
            }
        }
    }

    /// The entity whose edit permission gates viewing: the custom-mapped
    /// resource when one is registered, the subject otherwise.
    async fn view_target(&self, entry: &AuditEntry) -> anyhow::Result<Option<Entity>> {
        let Some(subject) = entry.subject.as_ref().filter(|s| !s.subject_id.is_empty()) else {
            return Ok(None);
        };

        let target = match self.inner.resources.route(&subject.subject_type) {
            Some(ResourceRoute::Custom(resource)) => resource.actual_resource(entry)?,
            _ => subject.clone(),
        };
        self.inner.entities.resolve(&target).await
    }

    /// Whether the field restore action applies to `entry`.
    pub async fn can_restore_fields(&self, entry: &AuditEntry) -> bool {
        !self.inner.settings.restore_action_hidden
            && entry.old().is_some()
            && self.can_view_subject(entry).await
    }

    /// Edit URL of the entry's subject resource, or `None`.
    pub fn resource_url(&self, entry: &AuditEntry) -> Option<String> {
        self.inner.resources.resolve_url(entry)
    }

    /// Whether the "view resource" action applies to `entry`.
    pub async fn can_open_resource(&self, entry: &AuditEntry) -> bool {
        !self.inner.settings.resource_action_hidden
            && self.resource_url(entry).is_some()
            && self.can_view_subject(entry).await
    }

    /// Whether the entry's subject still exists, is soft-deleted, or is
    /// gone. Lookup failures count as gone.
    pub async fn subject_state(&self, entry: &AuditEntry) -> SubjectState {
        let Some(subject) = &entry.subject else {
            return SubjectState::Missing;
        };
        match self.resolve_quietly(subject).await {
            Some(entity) if self.inner.entities.is_soft_deleted(&entity) => {
                SubjectState::SoftDeleted
            }
            Some(_) => SubjectState::Present,
            None => SubjectState::Missing,
        }
    }
}
