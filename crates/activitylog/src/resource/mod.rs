//! Subject resource registry and URL resolution.
//!
//! Each subject type that has an admin resource is registered with a
//! [`ResourceRoute`]. The default route derives the resource name from the
//! type name; a custom route maps the logged subject onto a different
//! record first (e.g. a translation row onto its parent page).
//!
//! Resolution never fails: anything that goes wrong yields `None`, the
//! "no location" sentinel, rendered as `#`.

mod naming;

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

pub use naming::{headline, kebab_case, pluralize, resource_plural_name};

use crate::models::{AuditEntry, SubjectRef};

/// Placeholder rendered when no location is available.
pub const NO_LOCATION: &str = "#";

/// Maps a logged subject onto the record its admin resource edits.
pub trait CustomResource: Send + Sync {
    fn actual_resource(&self, entry: &AuditEntry) -> Result<SubjectRef>;
}

/// How a registered subject type is mapped to a resource.
#[derive(Clone)]
pub enum ResourceRoute {
    /// Resource named after the subject type, editing the subject itself.
    Default,
    /// Resource chosen by a custom mapping.
    Custom(Arc<dyn CustomResource>),
}

impl std::fmt::Debug for ResourceRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceRoute::Default => f.write_str("Default"),
            ResourceRoute::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Registry of subject types that have admin resources.
#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Arc<ResourceRegistryInner>,
}

struct ResourceRegistryInner {
    panel_id: String,
    routes: DashMap<String, ResourceRoute>,
}

impl ResourceRegistry {
    /// Create an empty registry for the given admin panel.
    pub fn new(panel_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ResourceRegistryInner {
                panel_id: panel_id.into(),
                routes: DashMap::new(),
            }),
        }
    }

    pub fn panel_id(&self) -> &str {
        &self.inner.panel_id
    }

    /// Register a subject type with the default mapping.
    pub fn register(&self, subject_type: impl Into<String>) {
        self.inner
            .routes
            .insert(subject_type.into(), ResourceRoute::Default);
    }

    /// Register a subject type with a custom mapping.
    pub fn register_custom(
        &self,
        subject_type: impl Into<String>,
        resource: Arc<dyn CustomResource>,
    ) {
        self.inner
            .routes
            .insert(subject_type.into(), ResourceRoute::Custom(resource));
    }

    /// The route registered for `subject_type`.
    pub fn route(&self, subject_type: &str) -> Option<ResourceRoute> {
        self.inner.routes.get(subject_type).map(|r| r.clone())
    }

    /// Number of registered subject types.
    pub fn len(&self) -> usize {
        self.inner.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.routes.is_empty()
    }

    /// The record an entry's resource action should open: the subject
    /// itself, or whatever a custom mapping selects.
    pub fn resource_subject(&self, entry: &AuditEntry) -> Result<Option<SubjectRef>> {
        let Some(subject) = entry.subject.as_ref().filter(|s| !s.subject_id.is_empty()) else {
            return Ok(None);
        };

        match self.route(&subject.subject_type) {
            None => Ok(None),
            Some(ResourceRoute::Default) => Ok(Some(subject.clone())),
            Some(ResourceRoute::Custom(resource)) => resource.actual_resource(entry).map(Some),
        }
    }

    /// Edit URL of the entry's subject resource, or `None`.
    pub fn resolve_url(&self, entry: &AuditEntry) -> Option<String> {
        let subject = match self.resource_subject(entry) {
            Ok(Some(subject)) => subject,
            Ok(None) => return None,
            Err(e) => {
                debug!(entry = entry.id, error = %e, "custom resource mapping failed");
                return None;
            }
        };

        let plural = resource_plural_name(&subject.subject_type);
        if plural.is_empty() {
            return None;
        }

        Some(format!(
            "/{}/{}/{}/edit",
            self.inner.panel_id,
            plural,
            urlencoding::encode(&subject.subject_id)
        ))
    }

    /// Like [`resolve_url`](Self::resolve_url), rendering the sentinel as
    /// [`NO_LOCATION`].
    pub fn url_or_placeholder(&self, entry: &AuditEntry) -> String {
        self.resolve_url(entry)
            .unwrap_or_else(|| NO_LOCATION.to_string())
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("panel_id", &self.inner.panel_id)
            .field("routes", &self.inner.routes.len())
            .finish()
    }
}
