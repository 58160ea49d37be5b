// Policy lifecycle - permission-gated status transitions
//
//   pending  -> active | rejected | cancelled
//   active   -> rejected (admin override) | renewed | cancelled
//   rejected -> pending (creator's edit grant, before expiry)
//
// Field edits are handled by the entity repository; their status side
// effects are described by `PolicyStatus::edit_effect`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::audit::AuditTrail;
use super::edit_grants::{EditGrant, EditGrantLedger};
use crate::clock::Clock;
use crate::entities::{self, EntityKind, Policy, RejectionNote, ValidationStamp};
use crate::errors::DeskError;
use crate::observability::desk_metrics;
use crate::permissions::{Action, PermissionOracle, RequestContext};
use crate::store::DeskStore;
use crate::telemetry::create_operation_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Pending,
    Active,
    Rejected,
    Cancelled,
    Renewed,
}

/// What a field edit does to the status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEffect {
    InPlace,
    ResetToPending,
    RequiresGrant,
    Frozen,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Pending => "pending",
            PolicyStatus::Active => "active",
            PolicyStatus::Rejected => "rejected",
            PolicyStatus::Cancelled => "cancelled",
            PolicyStatus::Renewed => "renewed",
        }
    }

    /// Explicit transitions; the edit-driven reset of active policies is not listed here
    pub fn allowed_targets(&self) -> &'static [PolicyStatus] {
        use PolicyStatus::*;
        match self {
            Pending => &[Active, Rejected, Cancelled],
            Active => &[Rejected, Renewed, Cancelled],
            Rejected => &[Pending],
            Cancelled | Renewed => &[],
        }
    }

    pub fn can_transition_to(&self, target: PolicyStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn edit_effect(&self) -> EditEffect {
        match self {
            PolicyStatus::Pending => EditEffect::InPlace,
            PolicyStatus::Active => EditEffect::ResetToPending,
            PolicyStatus::Rejected => EditEffect::RequiresGrant,
            PolicyStatus::Cancelled | PolicyStatus::Renewed => EditEffect::Frozen,
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PolicyStatus::Pending),
            "active" => Ok(PolicyStatus::Active),
            "rejected" => Ok(PolicyStatus::Rejected),
            "cancelled" => Ok(PolicyStatus::Cancelled),
            "renewed" => Ok(PolicyStatus::Renewed),
            other => Err(DeskError::validation(format!("unknown policy status '{other}'"))),
        }
    }
}

/// Moves a rejected policy back to pending: validation and rejection
/// metadata are cleared.
pub(crate) fn apply_resubmission(policy: &mut Policy, now: DateTime<Utc>) {
    policy.status = PolicyStatus::Pending;
    policy.clear_validation();
    policy.rejection = None;
    policy.updated_at = now;
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowSettings {
    pub edit_window: Duration,
    pub min_rejection_reason: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            edit_window: Duration::hours(24),
            min_rejection_reason: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectionOutcome {
    pub policy: Policy,
    pub grant: EditGrant,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalOutcome {
    pub renewed: Policy,
    pub successor: Policy,
}

#[derive(Clone)]
pub struct PolicyStateMachine {
    store: Arc<dyn DeskStore>,
    oracle: Arc<dyn PermissionOracle>,
    clock: Arc<dyn Clock>,
    grants: EditGrantLedger,
    audit: AuditTrail,
    settings: WorkflowSettings,
}

impl PolicyStateMachine {
    pub fn new(
        store: Arc<dyn DeskStore>,
        oracle: Arc<dyn PermissionOracle>,
        clock: Arc<dyn Clock>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            grants: EditGrantLedger::new(store.clone(), clock.clone()),
            audit: AuditTrail::new(store.clone(), oracle.clone()),
            store,
            oracle,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn grants(&self) -> &EditGrantLedger {
        &self.grants
    }

    fn load(&self, policy_id: Uuid) -> Result<Policy, DeskError> {
        self.store
            .policy(policy_id)?
            .ok_or_else(|| DeskError::not_found(EntityKind::Policy, policy_id))
    }

    fn ensure_target(&self, policy: &Policy, target: PolicyStatus) -> Result<(), DeskError> {
        if policy.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(DeskError::invalid_transition(
                policy.entity_ref(),
                policy.status.as_str(),
                target.as_str(),
                "transition not allowed from the current status",
            ))
        }
    }

    fn commit(
        &self,
        ctx: &RequestContext,
        policy: &Policy,
        from: PolicyStatus,
        note: Option<&str>,
    ) -> Result<(), DeskError> {
        let actor_id = ctx.actor_id().ok_or(DeskError::Unauthenticated)?;
        self.store.save_policy(policy)?;
        self.audit.record(
            policy.entity_ref(),
            actor_id,
            policy.updated_at,
            from.as_str(),
            policy.status.as_str(),
            note,
        )?;
        desk_metrics().record_transition();
        info!(
            correlation.id = %ctx.correlation_id(),
            policy.id = %policy.id,
            policy.number = %policy.number,
            from = %from,
            to = %policy.status,
            "Policy transition committed"
        );
        Ok(())
    }

    /// pending -> active, stamping the validator
    pub fn approve(&self, ctx: &RequestContext, policy_id: Uuid, note: Option<&str>) -> Result<Policy, DeskError> {
        let span = create_operation_span("policy.approve", ctx.correlation_id());
        let _guard = span.enter();

        let mut policy = self.load(policy_id)?;
        let scope = entities::ownership(self.store.as_ref(), policy.responsible_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::ValidatePolicy, &scope)?;
        self.ensure_target(&policy, PolicyStatus::Active)?;

        let now = self.clock.now();
        let from = policy.status;
        policy.status = PolicyStatus::Active;
        policy.validation = Some(ValidationStamp {
            validated_by: actor.id,
            validated_at: now,
        });
        policy.rejection = None;
        policy.updated_at = now;

        self.commit(ctx, &policy, from, note)?;
        Ok(policy)
    }

    /// pending -> rejected, or active -> rejected for admins. Issues the
    /// creator's edit grant.
    pub fn reject(&self, ctx: &RequestContext, policy_id: Uuid, reason: &str) -> Result<RejectionOutcome, DeskError> {
        let span = create_operation_span("policy.reject", ctx.correlation_id());
        let _guard = span.enter();

        let mut policy = self.load(policy_id)?;
        let scope = entities::ownership(self.store.as_ref(), policy.responsible_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::ValidatePolicy, &scope)?;

        let reason = reason.trim();
        if reason.chars().count() < self.settings.min_rejection_reason {
            return Err(DeskError::validation(format!(
                "rejection reason must be at least {} characters",
                self.settings.min_rejection_reason
            )));
        }

        self.ensure_target(&policy, PolicyStatus::Rejected)?;
        if policy.status == PolicyStatus::Active && !ctx.is_admin() {
            return Err(DeskError::PermissionDenied {
                action: Action::ValidatePolicy,
                reason: "only an admin may reject an active policy".to_string(),
            });
        }

        let now = self.clock.now();
        let from = policy.status;
        policy.status = PolicyStatus::Rejected;
        policy.clear_validation();
        policy.rejection = Some(RejectionNote {
            reason: reason.to_string(),
            rejected_by: actor.id,
            rejected_at: now,
        });
        policy.updated_at = now;

        self.commit(ctx, &policy, from, Some(reason))?;
        let grant = self
            .grants
            .issue(policy.entity_ref(), policy.created_by, self.settings.edit_window)?;

        Ok(RejectionOutcome { policy, grant })
    }

    /// rejected -> pending without field edits
    pub fn resubmit(&self, ctx: &RequestContext, policy_id: Uuid, note: Option<&str>) -> Result<Policy, DeskError> {
        let span = create_operation_span("policy.resubmit", ctx.correlation_id());
        let _guard = span.enter();

        let mut policy = self.load(policy_id)?;
        let scope = entities::ownership(self.store.as_ref(), policy.responsible_id)?;
        self.oracle.check_scoped(ctx, Action::EditPolicy, &scope)?;
        self.ensure_target(&policy, PolicyStatus::Pending)?;

        let grant = self.grants.authorize(ctx, policy.entity_ref())?;
        let from = policy.status;
        apply_resubmission(&mut policy, self.clock.now());

        self.commit(ctx, &policy, from, note)?;
        self.grants.revoke(&grant)?;
        Ok(policy)
    }

    pub fn cancel(&self, ctx: &RequestContext, policy_id: Uuid, note: Option<&str>) -> Result<Policy, DeskError> {
        let span = create_operation_span("policy.cancel", ctx.correlation_id());
        let _guard = span.enter();

        let mut policy = self.load(policy_id)?;
        let scope = entities::ownership(self.store.as_ref(), policy.responsible_id)?;
        self.oracle.check_scoped(ctx, Action::CancelPolicy, &scope)?;
        self.ensure_target(&policy, PolicyStatus::Cancelled)?;

        let from = policy.status;
        policy.status = PolicyStatus::Cancelled;
        policy.updated_at = self.clock.now();

        self.commit(ctx, &policy, from, note)?;
        Ok(policy)
    }

    /// active -> renewed. A pending successor covering the next period of
    /// the same length is created alongside.
    pub fn renew(&self, ctx: &RequestContext, policy_id: Uuid, note: Option<&str>) -> Result<RenewalOutcome, DeskError> {
        let span = create_operation_span("policy.renew", ctx.correlation_id());
        let _guard = span.enter();

        let mut policy = self.load(policy_id)?;
        let scope = entities::ownership(self.store.as_ref(), policy.responsible_id)?;
        let actor = self.oracle.check_scoped(ctx, Action::RenewPolicy, &scope)?;
        self.ensure_target(&policy, PolicyStatus::Renewed)?;

        let now = self.clock.now();
        let term = policy.valid_to - policy.valid_from;
        let successor = Policy {
            id: Uuid::new_v4(),
            number: format!("{}-R", policy.number),
            status: PolicyStatus::Pending,
            created_by: actor.id,
            valid_from: policy.valid_to,
            valid_to: policy.valid_to + term,
            validation: None,
            rejection: None,
            created_at: now,
            updated_at: now,
            ..policy.clone()
        };
        entities::ensure_unique_number(self.store.as_ref(), &successor)?;

        let from = policy.status;
        policy.status = PolicyStatus::Renewed;
        policy.updated_at = now;

        self.commit(ctx, &policy, from, note)?;
        self.store.save_policy(&successor)?;
        self.audit.record(
            successor.entity_ref(),
            actor.id,
            now,
            "new",
            successor.status.as_str(),
            Some(&format!("renewal of {}", policy.number)),
        )?;

        Ok(RenewalOutcome {
            renewed: policy,
            successor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_table() {
        use PolicyStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Renewed));
        assert!(Rejected.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Active));
        assert!(!Active.can_transition_to(Pending));
        assert!(Cancelled.is_terminal());
        assert!(Renewed.is_terminal());
    }

    #[test]
    fn edit_effects() {
        assert_eq!(PolicyStatus::Active.edit_effect(), EditEffect::ResetToPending);
        assert_eq!(PolicyStatus::Rejected.edit_effect(), EditEffect::RequiresGrant);
        assert_eq!(PolicyStatus::Renewed.edit_effect(), EditEffect::Frozen);
    }

    #[test]
    fn status_parsing() {
        assert_eq!("Active".parse::<PolicyStatus>().unwrap(), PolicyStatus::Active);
        assert!("archived".parse::<PolicyStatus>().is_err());
    }
}
