// Claim ("siniestro") status workflow driven by a configurable catalog

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::audit::{AuditRecord, AuditTrail};
use crate::clock::Clock;
use crate::entities::{self, Claim, EntityKind};
use crate::errors::DeskError;
use crate::observability::desk_metrics;
use crate::permissions::{Action, PermissionOracle, RequestContext};
use crate::store::DeskStore;
use crate::telemetry::create_operation_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Open,
    Closed,
}

/// How a closed claim ended; drives the closure notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosureKind {
    Settled,
    Rejected,
    Withdrawn,
}

impl ClosureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClosureKind::Settled => "settled",
            ClosureKind::Rejected => "rejected",
            ClosureKind::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStatusDef {
    pub code: String,
    pub label: String,
    pub class: StatusClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closure: Option<ClosureKind>,
    /// Allowed successors. Empty means any known status.
    #[serde(default)]
    pub next: Vec<String>,
    #[serde(default)]
    pub initial: bool,
}

impl ClaimStatusDef {
    fn new(code: &str, label: &str, class: StatusClass, next: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            class,
            closure: None,
            next: next.iter().map(|s| s.to_string()).collect(),
            initial: false,
        }
    }

    fn closing(code: &str, label: &str, closure: ClosureKind) -> Self {
        Self {
            closure: Some(closure),
            ..Self::new(code, label, StatusClass::Closed, &[])
        }
    }

    pub fn is_open(&self) -> bool {
        self.class == StatusClass::Open
    }
}

/// Installation-wide claim status catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStatusCatalog {
    statuses: Vec<ClaimStatusDef>,
}

impl Default for ClaimStatusCatalog {
    fn default() -> Self {
        let mut abierto = ClaimStatusDef::new(
            "abierto",
            "Abierto",
            StatusClass::Open,
            &["en_revision", "rechazado", "desistido"],
        );
        abierto.initial = true;

        Self {
            statuses: vec![
                abierto,
                ClaimStatusDef::new(
                    "en_revision",
                    "En revisión",
                    StatusClass::Open,
                    &["documentacion_pendiente", "en_dictamen", "rechazado", "desistido"],
                ),
                ClaimStatusDef::new(
                    "documentacion_pendiente",
                    "Documentación pendiente",
                    StatusClass::Open,
                    &["en_revision", "desistido"],
                ),
                ClaimStatusDef::new(
                    "en_dictamen",
                    "En dictamen",
                    StatusClass::Open,
                    &["pagado", "rechazado", "en_revision"],
                ),
                ClaimStatusDef::closing("pagado", "Pagado", ClosureKind::Settled),
                ClaimStatusDef::closing("rechazado", "Rechazado", ClosureKind::Rejected),
                ClaimStatusDef::closing("desistido", "Desistido", ClosureKind::Withdrawn),
            ],
        }
    }
}

impl ClaimStatusCatalog {
    /// Builds a catalog after checking it is internally consistent
    pub fn new(statuses: Vec<ClaimStatusDef>) -> Result<Self, DeskError> {
        let catalog = Self { statuses };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), DeskError> {
        let mut seen = HashSet::new();
        for status in &self.statuses {
            if !seen.insert(status.code.as_str()) {
                return Err(DeskError::validation(format!(
                    "duplicate claim status '{}'",
                    status.code
                )));
            }
        }

        let initial: Vec<&ClaimStatusDef> = self.statuses.iter().filter(|s| s.initial).collect();
        match initial.as_slice() {
            [only] if only.is_open() => {}
            [_] => return Err(DeskError::validation("initial claim status must be open")),
            _ => {
                return Err(DeskError::validation(
                    "claim status catalog needs exactly one initial status",
                ))
            }
        }

        for status in &self.statuses {
            if let Some(unknown) = status.next.iter().find(|n| !seen.contains(n.as_str())) {
                return Err(DeskError::validation(format!(
                    "claim status '{}' lists unknown successor '{}'",
                    status.code, unknown
                )));
            }
            if !status.is_open() && !status.next.is_empty() {
                return Err(DeskError::validation(format!(
                    "closed claim status '{}' cannot list successors",
                    status.code
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&ClaimStatusDef> {
        self.statuses.iter().find(|s| s.code == code)
    }

    pub fn initial(&self) -> Option<&ClaimStatusDef> {
        self.statuses.iter().find(|s| s.initial)
    }

    pub fn is_open(&self, code: &str) -> bool {
        self.get(code).map(ClaimStatusDef::is_open).unwrap_or(false)
    }

    pub fn statuses(&self) -> &[ClaimStatusDef] {
        &self.statuses
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimTransition {
    pub claim: Claim,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closure: Option<ClosureKind>,
}

#[derive(Clone)]
pub struct ClaimWorkflow {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
    clock: Arc<dyn Clock>,
    catalog: Arc<ClaimStatusCatalog>,
    audit: AuditTrail,
}

impl ClaimWorkflow {
    pub fn new(
        store: Arc<dyn DeskStore>,
        oracle: Arc<dyn PermissionOracle>,
        clock: Arc<dyn Clock>,
        catalog: Arc<ClaimStatusCatalog>,
    ) -> Self {
        Self {
            audit: AuditTrail::new(store.clone(), oracle.clone()),
            store,
            oracle,
            clock,
            catalog,
        }
    }

    pub fn catalog(&self) -> &ClaimStatusCatalog {
        &self.catalog
    }

    /// Moves an open claim to `target`; closed-class statuses are terminal
    pub fn transition(
        &self,
        ctx: &RequestContext,
        claim_id: Uuid,
        target: &str,
        note: Option<&str>,
    ) -> Result<ClaimTransition, DeskError> {
        let span = create_operation_span("claim.transition", ctx.correlation_id());
        let _guard = span.enter();

        let mut claim = self
            .store
            .claim(claim_id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Claim, claim_id))?;
        let scope = entities::ownership(self.store.as_ref(), claim.responsible_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::ChangeClaimStatus, &scope)?;

        let target = target.trim();
        let current = self.catalog.get(&claim.status).ok_or_else(|| {
            DeskError::invalid_transition(
                claim.entity_ref(),
                claim.status.as_str(),
                target,
                "current status is not in the catalog",
            )
        })?;
        if !current.is_open() {
            return Err(DeskError::invalid_transition(
                claim.entity_ref(),
                claim.status.as_str(),
                target,
                "claim is closed",
            ));
        }

        let next = self
            .catalog
            .get(target)
            .ok_or_else(|| DeskError::validation(format!("unknown claim status '{target}'")))?;
        if next.code == current.code {
            return Err(DeskError::invalid_transition(
                claim.entity_ref(),
                claim.status.as_str(),
                target,
                "claim is already in this status",
            ));
        }
        if !current.next.is_empty() && !current.next.iter().any(|n| n == target) {
            return Err(DeskError::invalid_transition(
                claim.entity_ref(),
                claim.status.as_str(),
                target,
                "not an allowed successor",
            ));
        }

        let now = self.clock.now();
        let from = std::mem::replace(&mut claim.status, next.code.clone());
        claim.updated_at = now;
        if !next.is_open() {
            claim.closed_at = Some(now);
        }

        self.store.save_claim(&claim)?;
        self.audit
            .record(claim.entity_ref(), actor.id, now, &from, &claim.status, note)?;
        desk_metrics().record_transition();

        info!(
            correlation.id = %ctx.correlation_id(),
            claim.id = %claim.id,
            claim.number = %claim.number,
            from = %from,
            to = %claim.status,
            closed = !next.is_open(),
            "Claim transition committed"
        );

        Ok(ClaimTransition {
            closure: next.closure,
            claim,
            from,
        })
    }

    pub fn history(&self, ctx: &RequestContext, claim_id: Uuid) -> Result<Vec<AuditRecord>, DeskError> {
        let claim = self
            .store
            .claim(claim_id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Claim, claim_id))?;
        self.audit.history(ctx, claim.entity_ref())
    }
}
