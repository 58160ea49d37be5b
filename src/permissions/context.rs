// Request-scoped identity and capabilities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::roles::{Action, Role};
use crate::telemetry::generate_correlation_id;

/// A back-office user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Actor {
    pub fn new(email: &str, full_name: &str, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            full_name: full_name.trim().to_string(),
            phone: None,
            role,
            team_id: None,
            active: true,
            created_at: now,
        }
    }
}

/// Actions granted to the current actor, resolved once per request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    actions: BTreeSet<Action>,
}

impl CapabilitySet {
    pub fn for_role(role: Role) -> Self {
        Self {
            actions: Action::ALL
                .iter()
                .copied()
                .filter(|action| role.permits(*action))
                .collect(),
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Who is calling and what they may do, threaded explicitly into every call
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: Option<Actor>,
    capabilities: CapabilitySet,
    correlation_id: String,
}

impl RequestContext {
    /// Inactive actors resolve to an empty capability set.
    pub fn authenticated(actor: Actor) -> Self {
        let capabilities = if actor.active {
            CapabilitySet::for_role(actor.role)
        } else {
            CapabilitySet::default()
        };
        Self {
            actor: Some(actor),
            capabilities,
            correlation_id: generate_correlation_id(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            actor: None,
            capabilities: CapabilitySet::default(),
            correlation_id: generate_correlation_id(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.actor.as_ref().map(|a| a.id)
    }

    pub fn role(&self) -> Option<Role> {
        self.actor.as_ref().map(|a| a.role)
    }

    pub fn is_admin(&self) -> bool {
        self.actor
            .as_ref()
            .map(|a| a.active && a.role.is_admin())
            .unwrap_or(false)
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}
