// Clients, policies and claims: types, listing and the repository

pub mod catalog;
pub mod query;
pub mod repository;
pub mod types;

pub use catalog::{Coverage, CoverageCatalog};
pub use query::{paginate, ListQuery, Page};
pub use repository::{EntityRepository, RepositorySettings};
pub use types::{
    Claim, ClaimPatch, Client, ClientPatch, EntityKind, EntityRef, NewClaim, NewClient, NewPolicy,
    Policy, PolicyPatch, RejectionNote, ValidationStamp,
};

use uuid::Uuid;

use crate::errors::{DeskError, StoreResult};
use crate::permissions::Ownership;
use crate::store::DeskStore;

/// Policy numbers are unique across the store, ignoring case
pub(crate) fn ensure_unique_number(store: &dyn DeskStore, policy: &Policy) -> Result<(), DeskError> {
    let duplicate = store
        .policies()?
        .into_iter()
        .any(|p| p.id != policy.id && p.number.eq_ignore_ascii_case(&policy.number));
    if duplicate {
        return Err(DeskError::validation(format!(
            "policy number '{}' is already in use",
            policy.number
        )));
    }
    Ok(())
}

/// Owner plus the owner's team, for scoped permission checks. An unknown
/// owner yields an ownership nobody but admins and the owner id can see.
pub(crate) fn ownership(store: &dyn DeskStore, owner_id: Uuid) -> StoreResult<Ownership> {
    let team = store.actor(owner_id)?.and_then(|owner| owner.team_id);
    Ok(Ownership::new(owner_id, team))
}
