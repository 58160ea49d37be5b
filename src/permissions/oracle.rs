// Permission oracle - answers "may this actor perform this action"

use tracing::warn;
use uuid::Uuid;

use super::context::{Actor, RequestContext};
use super::roles::{Action, Role};
use crate::errors::DeskError;
use crate::observability::desk_metrics;

/// Owner and team of the record an action touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub owner_id: Uuid,
    pub owner_team: Option<Uuid>,
}

impl Ownership {
    pub fn new(owner_id: Uuid, owner_team: Option<Uuid>) -> Self {
        Self { owner_id, owner_team }
    }

    /// True when `actor` owns the record or shares the owner's team
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        if self.owner_id == actor.id {
            return true;
        }
        matches!((self.owner_team, actor.team_id), (Some(owner), Some(mine)) if owner == mine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Unauthenticated,
    InsufficientRole { role: Role },
    OutOfScope { role: Role },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    fn into_error(self, action: Action) -> Option<DeskError> {
        match self {
            Decision::Allowed => None,
            Decision::Unauthenticated => Some(DeskError::Unauthenticated),
            Decision::InsufficientRole { role } => Some(DeskError::PermissionDenied {
                action,
                reason: format!("role {role} lacks this permission"),
            }),
            Decision::OutOfScope { role } => Some(DeskError::PermissionDenied {
                action,
                reason: format!("role {role} may only act on its own or its team's records"),
            }),
        }
    }
}

/// Authorization seam consumed by every component
pub trait PermissionOracle: Send + Sync {
    /// Pure decision, no side effects
    fn evaluate(&self, ctx: &RequestContext, action: Action, scope: Option<&Ownership>) -> Decision;

    fn can_perform(&self, ctx: &RequestContext, action: Action) -> bool {
        self.evaluate(ctx, action, None).is_allowed()
    }

    /// Returns the acting user when allowed
    fn check<'a>(&self, ctx: &'a RequestContext, action: Action) -> Result<&'a Actor, DeskError> {
        enforce(self.evaluate(ctx, action, None), ctx, action)
    }

    fn check_scoped<'a>(
        &self,
        ctx: &'a RequestContext,
        action: Action,
        scope: &Ownership,
    ) -> Result<&'a Actor, DeskError> {
        enforce(self.evaluate(ctx, action, Some(scope)), ctx, action)
    }
}

fn enforce<'a>(
    decision: Decision,
    ctx: &'a RequestContext,
    action: Action,
) -> Result<&'a Actor, DeskError> {
    match (decision.into_error(action), ctx.actor()) {
        (None, Some(actor)) => Ok(actor),
        (None, None) => Err(DeskError::Unauthenticated),
        (Some(err), _) => {
            desk_metrics().record_denial();
            warn!(
                correlation.id = %ctx.correlation_id(),
                actor.id = ?ctx.actor_id(),
                action = %action,
                error = %err,
                "Permission check failed"
            );
            Err(err)
        }
    }
}

/// Default oracle backed by the role matrix
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleBasedOracle;

impl RoleBasedOracle {
    pub fn new() -> Self {
        Self
    }
}

impl PermissionOracle for RoleBasedOracle {
    fn evaluate(&self, ctx: &RequestContext, action: Action, scope: Option<&Ownership>) -> Decision {
        let Some(actor) = ctx.actor() else {
            return Decision::Unauthenticated;
        };

        if ctx.is_admin() {
            return Decision::Allowed;
        }

        if !ctx.capabilities().allows(action) {
            return Decision::InsufficientRole { role: actor.role };
        }

        match scope {
            Some(ownership) if actor.role.is_owner_scoped() && !ownership.is_visible_to(actor) => {
                Decision::OutOfScope { role: actor.role }
            }
            _ => Decision::Allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx_for(role: Role) -> RequestContext {
        RequestContext::authenticated(Actor::new("someone@agencia.mx", "Someone", role, Utc::now()))
    }

    #[test]
    fn anonymous_callers_are_unauthenticated_not_denied() {
        let oracle = RoleBasedOracle::new();
        let ctx = RequestContext::anonymous();
        assert_eq!(
            oracle.evaluate(&ctx, Action::ViewPolicies, None),
            Decision::Unauthenticated
        );
        assert!(matches!(
            oracle.check(&ctx, Action::ViewPolicies),
            Err(DeskError::Unauthenticated)
        ));
    }

    #[test]
    fn insufficient_role_is_permission_denied() {
        let oracle = RoleBasedOracle::new();
        let ctx = ctx_for(Role::Usuario);
        assert!(matches!(
            oracle.check(&ctx, Action::TransferOwnership),
            Err(DeskError::PermissionDenied { action: Action::TransferOwnership, .. })
        ));
    }

    #[test]
    fn admin_bypasses_scope() {
        let oracle = RoleBasedOracle::new();
        let ctx = ctx_for(Role::Admin);
        let foreign = Ownership::new(Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(oracle.check_scoped(&ctx, Action::EditPolicy, &foreign).is_ok());
    }

    #[test]
    fn agents_are_scoped_to_own_or_team_records() {
        let oracle = RoleBasedOracle::new();
        let team = Uuid::new_v4();
        let mut agent = Actor::new("agente@agencia.mx", "Agente", Role::Agente, Utc::now());
        agent.team_id = Some(team);
        let ctx = RequestContext::authenticated(agent.clone());

        let own = Ownership::new(agent.id, None);
        let teammate = Ownership::new(Uuid::new_v4(), Some(team));
        let stranger = Ownership::new(Uuid::new_v4(), Some(Uuid::new_v4()));

        assert!(oracle.check_scoped(&ctx, Action::EditPolicy, &own).is_ok());
        assert!(oracle.check_scoped(&ctx, Action::EditPolicy, &teammate).is_ok());
        assert!(matches!(
            oracle.check_scoped(&ctx, Action::EditPolicy, &stranger),
            Err(DeskError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn comercial_is_not_owner_scoped() {
        let oracle = RoleBasedOracle::new();
        let ctx = ctx_for(Role::Comercial);
        let foreign = Ownership::new(Uuid::new_v4(), None);
        assert!(oracle.check_scoped(&ctx, Action::EditPolicy, &foreign).is_ok());
    }
}
