//! Activity log restore engine.
//!
//! Reverts entities to states recorded in an append-only activity log:
//! restoring previous field values, or undeleting soft-deleted entities,
//! with the restore itself logged as a new entry. Storage, authorization,
//! and the acting user are collaborators behind traits; [`MemoryStore`]
//! provides an in-memory implementation of both stores.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod presentation;
pub mod query;
pub mod resource;
pub mod restore;
pub mod store;

pub use auth::{
    Actor, ActorContext, AuthorizationOracle, FixedActor, OracleFailurePolicy, PermissionOracle,
};
pub use config::Config;
pub use error::{RestoreError, RestoreResult};
pub use models::{
    AuditEntry, AuditEntryDraft, Entity, EntryId, EventKind, FieldMap, Properties,
    RestoreMetadata, SubjectRef,
};
pub use presentation::{Notice, NoticeLevel, NotificationSink, SubjectState, TracingSink};
pub use query::{ActivityQuery, SortColumn, SortDirection};
pub use resource::{CustomResource, ResourceRegistry, ResourceRoute};
pub use restore::{Collaborators, RestoreEngine, RestoreOutcome, RestoreSettings};
pub use store::{
    AuditLogStore, EntityStore, LogSuppression, MemoryStore, StoreTransaction, SuppressionGuard,
};
