//! Actors and authorization collaborators.

use std::str::FromStr;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::models::Entity;

/// Permission that grants every action on every subject.
pub const ADMINISTER_PERMISSION: &str = "administer activity log";

/// The caller on whose behalf a restore runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    /// Display name, if known.
    pub name: Option<String>,
    pub permissions: Vec<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            permissions: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Check if the actor holds a specific permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Supplies the acting caller, if one is authenticated.
pub trait ActorContext: Send + Sync {
    fn current(&self) -> Option<Actor>;
}

/// Actor context that always reports the same caller.
#[derive(Debug, Clone, Default)]
pub struct FixedActor(pub Option<Actor>);

impl FixedActor {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn new(actor: Actor) -> Self {
        Self(Some(actor))
    }
}

impl ActorContext for FixedActor {
    fn current(&self) -> Option<Actor> {
        self.0.clone()
    }
}

/// Yes/no capability check. May fail; each call site decides how to treat
/// the failure.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
    async fn can(&self, actor: &Actor, action: &str, entity: &Entity) -> Result<bool>;
}

/// Oracle backed by the actor's permission strings.
///
/// An action is allowed when the actor holds `"{action} {subject_type}"`,
/// or [`ADMINISTER_PERMISSION`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionOracle;

impl PermissionOracle {
    /// Permission name for `action` on entities of `subject_type`.
    pub fn permission_for(action: &str, subject_type: &str) -> String {
        format!("{action} {subject_type}")
    }
}

#[async_trait]
impl AuthorizationOracle for PermissionOracle {
    async fn can(&self, actor: &Actor, action: &str, entity: &Entity) -> Result<bool> {
        if actor.has_permission(ADMINISTER_PERMISSION) {
            return Ok(true);
        }
        Ok(actor.has_permission(&Self::permission_for(
            action,
            &entity.subject.subject_type,
        )))
    }
}

/// What to do when the oracle itself fails during a restore precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OracleFailurePolicy {
    /// Treat the failure as permission granted.
    #[default]
    FailOpen,
    /// Treat the failure as permission denied.
    FailClosed,
}

impl OracleFailurePolicy {
    /// The decision to use when the oracle could not answer.
    pub fn decide(self) -> bool {
        matches!(self, OracleFailurePolicy::FailOpen)
    }
}

impl FromStr for OracleFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" | "fail_open" | "fail-open" => Ok(OracleFailurePolicy::FailOpen),
            "closed" | "fail_closed" | "fail-closed" => Ok(OracleFailurePolicy::FailClosed),
            other => bail!("unknown authorization failure policy '{other}'"),
        }
    }
}
