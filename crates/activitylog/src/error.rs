//! Restore error types.

use thiserror::Error;

use crate::models::EntryId;

/// Why a restore (or its precondition) did not go through.
///
/// Every kind is recoverable; the caller decides how to surface it.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("activity {0} not found")]
    EntryNotFound(EntryId),

    #[error("activity has no previous properties to restore")]
    NoPriorState,

    #[error("subject of the activity could not be found")]
    SubjectNotFound,

    #[error("restoring deleted models is disabled")]
    RestoreDisabled,

    /// The entry does not qualify for a soft-delete restore. Raised both
    /// when the entry does not record a deletion and when its subject is
    /// live or cannot be soft-deleted.
    #[error("subject is not soft-deleted")]
    NotSoftDeleted,

    #[error("not authorized to restore this subject")]
    Unauthorized,

    #[error("restore failed: {0:#}")]
    RestoreFailed(#[source] anyhow::Error),
}

impl RestoreError {
    /// Wrap a collaborator failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        RestoreError::RestoreFailed(err.into())
    }

    /// Stable machine name of the kind, used for notices and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            RestoreError::EntryNotFound(_) => "entry_not_found",
            RestoreError::NoPriorState => "no_prior_state",
            RestoreError::SubjectNotFound => "subject_not_found",
            RestoreError::RestoreDisabled => "restore_disabled",
            RestoreError::NotSoftDeleted => "not_soft_deleted",
            RestoreError::Unauthorized => "unauthorized",
            RestoreError::RestoreFailed(_) => "restore_failed",
        }
    }
}

/// Result type alias using RestoreError.
pub type RestoreResult<T> = Result<T, RestoreError>;
