// Document records and purge bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::entities::EntityRef;

/// active -> discarded (any back-office role) -> active | deleted (admin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Active,
    Discarded,
    Deleted,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Active => "active",
            DocumentState::Discarded => "discarded",
            DocumentState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a policy or claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub parent: EntityRef,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub state: DocumentState,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::Document(self.id)
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_name: String,
    pub content_type: String,
    pub contents: Vec<u8>,
}

/// Records removed by a purge and the storage objects left to release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeManifest {
    pub root: EntityRef,
    pub removed_records: Vec<EntityRef>,
    pub storage_paths: Vec<String>,
}

impl PurgeManifest {
    pub fn new(root: EntityRef) -> Self {
        Self {
            root,
            removed_records: Vec::new(),
            storage_paths: Vec::new(),
        }
    }
}

/// Outcome of releasing a manifest's storage objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub released: Vec<String>,
    pub orphaned: Vec<String>,
}

impl PurgeReport {
    pub fn is_complete(&self) -> bool {
        self.orphaned.is_empty()
    }
}
