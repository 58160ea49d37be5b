// Append-only transition history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entities::EntityRef;
use crate::errors::DeskError;
use crate::permissions::{Action, PermissionOracle, RequestContext};
use crate::store::DeskStore;

/// One status change. Never edited after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub entity: EntityRef,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
    pub from_state: String,
    pub to_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn DeskStore>, oracle: Arc<dyn PermissionOracle>) -> Self {
        Self { store, oracle }
    }

    pub fn record(
        &self,
        entity: EntityRef,
        actor_id: Uuid,
        at: DateTime<Utc>,
        from_state: &str,
        to_state: &str,
        note: Option<&str>,
    ) -> Result<AuditRecord, DeskError> {
        let record = AuditRecord {
            id: Uuid::new_v4(),
            entity,
            actor_id,
            at,
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            note: note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        };
        self.store.append_audit(&record)?;
        debug!(
            entity = %entity,
            actor.id = %actor_id,
            from = from_state,
            to = to_state,
            "Audit record appended"
        );
        Ok(record)
    }

    /// Oldest first
    pub fn history(&self, ctx: &RequestContext, entity: EntityRef) -> Result<Vec<AuditRecord>, DeskError> {
        self.oracle.check(ctx, Action::ViewAudit)?;
        let mut records = self.store.audit_for(entity)?;
        records.sort_by_key(|r| r.at);
        Ok(records)
    }
}
