// Bulk ownership transfer between actors
//
// Best effort: every entity is handled on its own, failures are counted and
// reported, and nothing already moved is rolled back.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::entities::EntityKind;
use crate::errors::DeskError;
use crate::permissions::{Action, PermissionOracle, RequestContext};
use crate::store::DeskStore;
use crate::telemetry::create_operation_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferScope {
    Policies,
    Clients,
    Both,
}

impl TransferScope {
    fn includes_policies(&self) -> bool {
        matches!(self, TransferScope::Policies | TransferScope::Both)
    }

    fn includes_clients(&self) -> bool {
        matches!(self, TransferScope::Clients | TransferScope::Both)
    }
}

impl FromStr for TransferScope {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "policies" => Ok(TransferScope::Policies),
            "clients" => Ok(TransferScope::Clients),
            "both" => Ok(TransferScope::Both),
            other => Err(DeskError::validation(format!("unknown transfer scope '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    pub moved: usize,
    /// Entities found but not owned by the source actor
    pub skipped: usize,
    pub failures: Vec<TransferFailure>,
}

#[derive(Clone)]
pub struct TransferCoordinator {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
    clock: Arc<dyn Clock>,
}

enum Outcome {
    Moved,
    Skipped,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn DeskStore>, oracle: Arc<dyn PermissionOracle>, clock: Arc<dyn Clock>) -> Self {
        Self { store, oracle, clock }
    }

    fn authorize(&self, ctx: &RequestContext, from: Uuid, to: Uuid) -> Result<(), DeskError> {
        self.oracle.check(ctx, Action::TransferOwnership)?;
        if !ctx.is_admin() {
            return Err(DeskError::PermissionDenied {
                action: Action::TransferOwnership,
                reason: "admin only".to_string(),
            });
        }
        if from == to {
            return Err(DeskError::validation("source and target actor are the same"));
        }
        match self.store.actor(to)? {
            Some(target) if target.active => Ok(()),
            Some(_) => Err(DeskError::validation(format!("target actor {to} is deactivated"))),
            None => Err(DeskError::not_found(EntityKind::Actor, to)),
        }
    }

    /// Moves the listed policies and/or clients from `from` to `to`
    pub fn transfer(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
        from: Uuid,
        to: Uuid,
        scope: TransferScope,
    ) -> Result<TransferReport, DeskError> {
        let span = create_operation_span("ownership.transfer", ctx.correlation_id());
        let _guard = span.enter();

        self.authorize(ctx, from, to)?;

        let mut report = TransferReport::default();
        for &id in ids {
            match self.move_one(id, from, to, scope) {
                Ok(Outcome::Moved) => report.moved += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(entity.id = %id, error = %e, "Ownership transfer failed for entity");
                    report.failures.push(TransferFailure {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            correlation.id = %ctx.correlation_id(),
            from = %from,
            to = %to,
            scope = ?scope,
            moved = report.moved,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Ownership transfer finished"
        );
        Ok(report)
    }

    /// Moves everything in scope currently owned by `from`
    pub fn transfer_all(
        &self,
        ctx: &RequestContext,
        from: Uuid,
        to: Uuid,
        scope: TransferScope,
    ) -> Result<TransferReport, DeskError> {
        self.authorize(ctx, from, to)?;

        let mut ids = Vec::new();
        if scope.includes_policies() {
            ids.extend(
                self.store
                    .policies()?
                    .into_iter()
                    .filter(|p| p.responsible_id == from)
                    .map(|p| p.id),
            );
        }
        if scope.includes_clients() {
            ids.extend(
                self.store
                    .clients()?
                    .into_iter()
                    .filter(|c| c.owner_id == from)
                    .map(|c| c.id),
            );
        }
        self.transfer(ctx, &ids, from, to, scope)
    }

    fn move_one(&self, id: Uuid, from: Uuid, to: Uuid, scope: TransferScope) -> Result<Outcome, DeskError> {
        let now = self.clock.now();

        if scope.includes_policies() {
            if let Some(mut policy) = self.store.policy(id)? {
                if policy.responsible_id != from {
                    return Ok(Outcome::Skipped);
                }
                policy.responsible_id = to;
                policy.updated_at = now;
                self.store.save_policy(&policy)?;
                return Ok(Outcome::Moved);
            }
        }

        if scope.includes_clients() {
            if let Some(mut client) = self.store.client(id)? {
                if client.owner_id != from {
                    return Ok(Outcome::Skipped);
                }
                client.owner_id = to;
                client.updated_at = now;
                self.store.save_client(&client)?;
                return Ok(Outcome::Moved);
            }
        }

        let kind = if scope.includes_policies() {
            EntityKind::Policy
        } else {
            EntityKind::Client
        };
        Err(DeskError::not_found(kind, id))
    }
}
