// Time-boxed edit grants issued on rejection
//
// A grant names the creator of the rejected record and an expiry instant.
// It stops being usable when the expiry passes or when the record is
// re-submitted, whichever comes first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::entities::EntityRef;
use crate::errors::DeskError;
use crate::permissions::{Action, RequestContext};
use crate::store::DeskStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditGrant {
    pub id: Uuid,
    pub entity: EntityRef,
    pub holder_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl EditGrant {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }

    /// Revoked by the expiry sweep rather than used or superseded
    pub fn lapsed(&self) -> bool {
        self.revoked_at.is_some_and(|at| at >= self.expires_at)
    }
}

#[derive(Clone)]
pub struct EditGrantLedger {
    store: Arc<dyn DeskStore>,
    clock: Arc<dyn Clock>,
}

impl EditGrantLedger {
    pub fn new(store: Arc<dyn DeskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issues a fresh grant, revoking any earlier unrevoked grant on `entity`
    pub fn issue(&self, entity: EntityRef, holder_id: Uuid, window: Duration) -> Result<EditGrant, DeskError> {
        let now = self.clock.now();

        for mut previous in self.store.edit_grants_for(entity)? {
            if previous.revoked_at.is_none() {
                previous.revoked_at = Some(now);
                self.store.save_edit_grant(&previous)?;
            }
        }

        let grant = EditGrant {
            id: Uuid::new_v4(),
            entity,
            holder_id,
            created_at: now,
            expires_at: now + window,
            revoked_at: None,
        };
        self.store.save_edit_grant(&grant)?;

        info!(
            entity = %entity,
            holder.id = %holder_id,
            expires_at = %grant.expires_at,
            "Edit grant issued"
        );
        Ok(grant)
    }

    /// Most recent unrevoked grant, expired or not
    pub fn current(&self, entity: EntityRef) -> Result<Option<EditGrant>, DeskError> {
        Ok(self
            .store
            .edit_grants_for(entity)?
            .into_iter()
            .filter(|g| g.revoked_at.is_none())
            .max_by_key(|g| g.created_at))
    }

    /// Most recent grant on `entity`, revoked or not
    fn latest(&self, entity: EntityRef) -> Result<Option<EditGrant>, DeskError> {
        Ok(self
            .store
            .edit_grants_for(entity)?
            .into_iter()
            .max_by_key(|g| g.created_at))
    }

    /// Checks that the caller may leave the rejected state right now.
    ///
    /// Holder or admin only; every caller is bound by the expiry, which is
    /// read from the clock on each call. A grant already swept still
    /// reports the expired window.
    pub fn authorize(&self, ctx: &RequestContext, entity: EntityRef) -> Result<EditGrant, DeskError> {
        let actor = ctx.actor().ok_or(DeskError::Unauthenticated)?;

        let grant = self
            .latest(entity)?
            .filter(|g| g.revoked_at.is_none() || g.lapsed())
            .ok_or_else(|| DeskError::invalid_transition(entity, "rejected", "pending", "no edit grant on file"))?;

        if grant.holder_id != actor.id && !ctx.is_admin() {
            return Err(DeskError::PermissionDenied {
                action: Action::EditPolicy,
                reason: "the edit grant belongs to the record's creator".to_string(),
            });
        }

        if grant.lapsed() || self.clock.now() >= grant.expires_at {
            return Err(DeskError::EditWindowExpired {
                entity,
                expired_at: grant.expires_at,
            });
        }

        Ok(grant)
    }

    pub fn revoke(&self, grant: &EditGrant) -> Result<EditGrant, DeskError> {
        let mut revoked = grant.clone();
        revoked.revoked_at = Some(self.clock.now());
        self.store.save_edit_grant(&revoked)?;
        Ok(revoked)
    }

    /// Live grants held by `holder_id`
    pub fn live_for_holder(&self, holder_id: Uuid) -> Result<Vec<EditGrant>, DeskError> {
        let now = self.clock.now();
        Ok(self
            .store
            .edit_grants()?
            .into_iter()
            .filter(|g| g.holder_id == holder_id && g.is_live(now))
            .collect())
    }

    /// Marks expired grants as revoked at their expiry instant
    pub fn sweep_expired(&self) -> Result<usize, DeskError> {
        let now = self.clock.now();
        let mut swept = 0;
        for mut grant in self.store.edit_grants()? {
            if grant.revoked_at.is_none() && now >= grant.expires_at {
                grant.revoked_at = Some(grant.expires_at);
                self.store.save_edit_grant(&grant)?;
                swept += 1;
            }
        }
        if swept > 0 {
            info!(swept, "Expired edit grants revoked");
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::permissions::{Actor, Role};
    use crate::store::InMemoryStore;

    fn ledger() -> (EditGrantLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryStore::new());
        (EditGrantLedger::new(store, clock.clone()), clock)
    }

    #[test]
    fn reissuing_revokes_the_previous_grant() {
        let (ledger, _clock) = ledger();
        let entity = EntityRef::Policy(Uuid::new_v4());
        let holder = Uuid::new_v4();

        let first = ledger.issue(entity, holder, Duration::hours(24)).unwrap();
        let second = ledger.issue(entity, holder, Duration::hours(24)).unwrap();

        let current = ledger.current(entity).unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_ne!(current.id, first.id);
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let (ledger, clock) = ledger();
        let actor = Actor::new("agente@agencia.mx", "Agente", Role::Agente, clock.now());
        let entity = EntityRef::Policy(Uuid::new_v4());
        let grant = ledger.issue(entity, actor.id, Duration::hours(24)).unwrap();
        let ctx = RequestContext::authenticated(actor);

        clock.set(grant.expires_at - Duration::seconds(1));
        assert!(ledger.authorize(&ctx, entity).is_ok());

        clock.set(grant.expires_at);
        assert!(matches!(
            ledger.authorize(&ctx, entity),
            Err(DeskError::EditWindowExpired { .. })
        ));
    }

    #[test]
    fn other_actors_are_denied_before_expiry_is_considered() {
        let (ledger, clock) = ledger();
        let entity = EntityRef::Policy(Uuid::new_v4());
        ledger.issue(entity, Uuid::new_v4(), Duration::hours(24)).unwrap();
        let intruder = Actor::new("otro@agencia.mx", "Otro", Role::Agente, clock.now());

        assert!(matches!(
            ledger.authorize(&RequestContext::authenticated(intruder), entity),
            Err(DeskError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn sweep_revokes_only_expired_grants() {
        let (ledger, clock) = ledger();
        let stale = EntityRef::Policy(Uuid::new_v4());
        ledger.issue(stale, Uuid::new_v4(), Duration::hours(1)).unwrap();
        clock.advance(Duration::hours(2));
        let fresh = EntityRef::Policy(Uuid::new_v4());
        ledger.issue(fresh, Uuid::new_v4(), Duration::hours(24)).unwrap();

        assert_eq!(ledger.sweep_expired().unwrap(), 1);
        assert!(ledger.current(stale).unwrap().is_none());
        assert!(ledger.current(fresh).unwrap().is_some());
    }

    #[test]
    fn swept_grants_still_report_the_expired_window() {
        let (ledger, clock) = ledger();
        let actor = Actor::new("agente@agencia.mx", "Agente", Role::Agente, clock.now());
        let entity = EntityRef::Policy(Uuid::new_v4());
        let grant = ledger.issue(entity, actor.id, Duration::hours(24)).unwrap();
        let ctx = RequestContext::authenticated(actor);

        clock.set(grant.expires_at + Duration::seconds(1));
        assert_eq!(ledger.sweep_expired().unwrap(), 1);

        let err = ledger.authorize(&ctx, entity).unwrap_err();
        assert!(matches!(err, DeskError::EditWindowExpired { expired_at, .. } if expired_at == grant.expires_at));
    }

    #[test]
    fn a_used_grant_is_not_reported_as_expired() {
        let (ledger, clock) = ledger();
        let actor = Actor::new("agente@agencia.mx", "Agente", Role::Agente, clock.now());
        let entity = EntityRef::Policy(Uuid::new_v4());
        let grant = ledger.issue(entity, actor.id, Duration::hours(24)).unwrap();
        ledger.revoke(&grant).unwrap();
        let ctx = RequestContext::authenticated(actor);

        clock.set(grant.expires_at + Duration::seconds(1));
        let err = ledger.authorize(&ctx, entity).unwrap_err();
        assert!(matches!(err, DeskError::InvalidTransition { .. }));
    }
}
