// Actors, teams and bulk ownership transfer

pub mod directory;
pub mod transfer;

pub use directory::{ActorDirectory, NewActor};
pub use transfer::{TransferCoordinator, TransferFailure, TransferReport, TransferScope};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Group of actors used for reporting, transfer scoping and visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
