// Backing store abstraction
//
// Stands in for the hosted relational database. Every call is atomic on its
// own; there are no cross-record transactions.

pub mod memory;
pub mod snapshot;

pub use memory::{InMemoryStore, StoreState};
pub use snapshot::{SnapshotFile, SNAPSHOT_VERSION};

use uuid::Uuid;

use crate::documents::Document;
use crate::entities::{Claim, Client, EntityRef, Policy};
use crate::errors::StoreResult;
use crate::permissions::Actor;
use crate::teams::Team;
use crate::workflows::{AuditRecord, EditGrant};

pub trait DeskStore: Send + Sync {
    fn actor(&self, id: Uuid) -> StoreResult<Option<Actor>>;
    fn actor_by_email(&self, email: &str) -> StoreResult<Option<Actor>>;
    fn actors(&self) -> StoreResult<Vec<Actor>>;
    fn save_actor(&self, actor: &Actor) -> StoreResult<()>;

    fn team(&self, id: Uuid) -> StoreResult<Option<Team>>;
    fn teams(&self) -> StoreResult<Vec<Team>>;
    fn save_team(&self, team: &Team) -> StoreResult<()>;

    fn client(&self, id: Uuid) -> StoreResult<Option<Client>>;
    fn clients(&self) -> StoreResult<Vec<Client>>;
    fn save_client(&self, client: &Client) -> StoreResult<()>;

    fn policy(&self, id: Uuid) -> StoreResult<Option<Policy>>;
    fn policies(&self) -> StoreResult<Vec<Policy>>;
    fn save_policy(&self, policy: &Policy) -> StoreResult<()>;
    fn remove_policy(&self, id: Uuid) -> StoreResult<bool>;

    fn claim(&self, id: Uuid) -> StoreResult<Option<Claim>>;
    fn claims(&self) -> StoreResult<Vec<Claim>>;
    fn save_claim(&self, claim: &Claim) -> StoreResult<()>;
    fn remove_claim(&self, id: Uuid) -> StoreResult<bool>;

    fn document(&self, id: Uuid) -> StoreResult<Option<Document>>;
    fn documents_for(&self, parent: EntityRef) -> StoreResult<Vec<Document>>;
    fn save_document(&self, document: &Document) -> StoreResult<()>;
    fn remove_document(&self, id: Uuid) -> StoreResult<bool>;

    fn edit_grants_for(&self, entity: EntityRef) -> StoreResult<Vec<EditGrant>>;
    fn edit_grants(&self) -> StoreResult<Vec<EditGrant>>;
    fn save_edit_grant(&self, grant: &EditGrant) -> StoreResult<()>;

    fn append_audit(&self, record: &AuditRecord) -> StoreResult<()>;
    fn audit_for(&self, entity: EntityRef) -> StoreResult<Vec<AuditRecord>>;
}
