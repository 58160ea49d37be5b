// In-memory backing store with failure injection for tests

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;
use uuid::Uuid;

use super::DeskStore;
use crate::documents::Document;
use crate::entities::{Claim, Client, EntityRef, Policy};
use crate::errors::{StoreError, StoreResult};
use crate::permissions::Actor;
use crate::teams::Team;
use crate::workflows::{AuditRecord, EditGrant};

/// Every collection the store holds; also the on-disk snapshot body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub actors: BTreeMap<Uuid, Actor>,
    #[serde(default)]
    pub teams: BTreeMap<Uuid, Team>,
    #[serde(default)]
    pub clients: BTreeMap<Uuid, Client>,
    #[serde(default)]
    pub policies: BTreeMap<Uuid, Policy>,
    #[serde(default)]
    pub claims: BTreeMap<Uuid, Claim>,
    #[serde(default)]
    pub documents: BTreeMap<Uuid, Document>,
    #[serde(default)]
    pub edit_grants: BTreeMap<Uuid, EditGrant>,
    #[serde(default)]
    pub audit: Vec<AuditRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    offline: AtomicBool,
    failing_writes: Mutex<HashSet<Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    /// Copy of the current state for persistence
    pub fn snapshot(&self) -> StoreResult<StoreState> {
        Ok(self.read()?.clone())
    }

    /// Simulates losing the database connection
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every later write to the record with `id` fail
    pub fn fail_writes_for(&self, id: Uuid) {
        match self.failing_writes.lock() {
            Ok(mut ids) => {
                ids.insert(id);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id);
            }
        }
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.ensure_online()?;
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self, entity: EntityRef) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.ensure_online()?;
        let rejected = match self.failing_writes.lock() {
            Ok(ids) => ids.contains(&entity.id()),
            Err(poisoned) => poisoned.into_inner().contains(&entity.id()),
        };
        if rejected {
            warn!(entity = %entity, "Injected write failure");
            return Err(StoreError::WriteRejected {
                entity,
                reason: "write rejected by store".to_string(),
            });
        }
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl DeskStore for InMemoryStore {
    fn actor(&self, id: Uuid) -> StoreResult<Option<Actor>> {
        Ok(self.read()?.actors.get(&id).cloned())
    }

    fn actor_by_email(&self, email: &str) -> StoreResult<Option<Actor>> {
        let email = email.trim().to_lowercase();
        Ok(self.read()?.actors.values().find(|a| a.email == email).cloned())
    }

    fn actors(&self) -> StoreResult<Vec<Actor>> {
        Ok(self.read()?.actors.values().cloned().collect())
    }

    fn save_actor(&self, actor: &Actor) -> StoreResult<()> {
        self.write(EntityRef::Actor(actor.id))?
            .actors
            .insert(actor.id, actor.clone());
        Ok(())
    }

    fn team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.read()?.teams.get(&id).cloned())
    }

    fn teams(&self) -> StoreResult<Vec<Team>> {
        Ok(self.read()?.teams.values().cloned().collect())
    }

    fn save_team(&self, team: &Team) -> StoreResult<()> {
        self.write(EntityRef::Team(team.id))?
            .teams
            .insert(team.id, team.clone());
        Ok(())
    }

    fn client(&self, id: Uuid) -> StoreResult<Option<Client>> {
        Ok(self.read()?.clients.get(&id).cloned())
    }

    fn clients(&self) -> StoreResult<Vec<Client>> {
        Ok(self.read()?.clients.values().cloned().collect())
    }

    fn save_client(&self, client: &Client) -> StoreResult<()> {
        self.write(EntityRef::Client(client.id))?
            .clients
            .insert(client.id, client.clone());
        Ok(())
    }

    fn policy(&self, id: Uuid) -> StoreResult<Option<Policy>> {
        Ok(self.read()?.policies.get(&id).cloned())
    }

    fn policies(&self) -> StoreResult<Vec<Policy>> {
        Ok(self.read()?.policies.values().cloned().collect())
    }

    fn save_policy(&self, policy: &Policy) -> StoreResult<()> {
        self.write(policy.entity_ref())?
            .policies
            .insert(policy.id, policy.clone());
        Ok(())
    }

    fn remove_policy(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.write(EntityRef::Policy(id))?.policies.remove(&id).is_some())
    }

    fn claim(&self, id: Uuid) -> StoreResult<Option<Claim>> {
        Ok(self.read()?.claims.get(&id).cloned())
    }

    fn claims(&self) -> StoreResult<Vec<Claim>> {
        Ok(self.read()?.claims.values().cloned().collect())
    }

    fn save_claim(&self, claim: &Claim) -> StoreResult<()> {
        self.write(claim.entity_ref())?
            .claims
            .insert(claim.id, claim.clone());
        Ok(())
    }

    fn remove_claim(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.write(EntityRef::Claim(id))?.claims.remove(&id).is_some())
    }

    fn document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        Ok(self.read()?.documents.get(&id).cloned())
    }

    fn documents_for(&self, parent: EntityRef) -> StoreResult<Vec<Document>> {
        Ok(self
            .read()?
            .documents
            .values()
            .filter(|d| d.parent == parent)
            .cloned()
            .collect())
    }

    fn save_document(&self, document: &Document) -> StoreResult<()> {
        self.write(document.entity_ref())?
            .documents
            .insert(document.id, document.clone());
        Ok(())
    }

    fn remove_document(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self
            .write(EntityRef::Document(id))?
            .documents
            .remove(&id)
            .is_some())
    }

    fn edit_grants_for(&self, entity: EntityRef) -> StoreResult<Vec<EditGrant>> {
        Ok(self
            .read()?
            .edit_grants
            .values()
            .filter(|g| g.entity == entity)
            .cloned()
            .collect())
    }

    fn edit_grants(&self) -> StoreResult<Vec<EditGrant>> {
        Ok(self.read()?.edit_grants.values().cloned().collect())
    }

    fn save_edit_grant(&self, grant: &EditGrant) -> StoreResult<()> {
        self.write(grant.entity)?
            .edit_grants
            .insert(grant.id, grant.clone());
        Ok(())
    }

    fn append_audit(&self, record: &AuditRecord) -> StoreResult<()> {
        self.write(record.entity)?.audit.push(record.clone());
        Ok(())
    }

    fn audit_for(&self, entity: EntityRef) -> StoreResult<Vec<AuditRecord>> {
        Ok(self
            .read()?
            .audit
            .iter()
            .filter(|r| r.entity == entity)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use chrono::Utc;

    #[test]
    fn offline_store_reports_unavailable() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(matches!(store.actors(), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn injected_write_failures_only_hit_the_named_record() {
        let store = InMemoryStore::new();
        let blocked = Actor::new("a@agencia.mx", "A", Role::Agente, Utc::now());
        let fine = Actor::new("b@agencia.mx", "B", Role::Agente, Utc::now());
        store.fail_writes_for(blocked.id);

        assert!(matches!(
            store.save_actor(&blocked),
            Err(StoreError::WriteRejected { .. })
        ));
        assert!(store.save_actor(&fine).is_ok());
        assert_eq!(store.actor_by_email("B@agencia.mx").unwrap().map(|a| a.id), Some(fine.id));
    }
}
