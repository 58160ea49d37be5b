// JSON snapshot of the whole store, used by the CLI between runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::info;

use super::memory::StoreState;
use crate::errors::{StoreError, StoreResult};

pub const SNAPSHOT_VERSION: &str = "1";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: String,
    saved_at: DateTime<Utc>,
    state: StoreState,
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot; a missing file is an empty store
    pub async fn load(&self) -> StoreResult<StoreState> {
        if !fs::try_exists(&self.path).await? {
            info!(file = ?self.path, "No snapshot found, starting empty");
            return Ok(StoreState::default());
        }

        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let envelope: SnapshotEnvelope = serde_json::from_str(&contents)?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SNAPSHOT_VERSION.to_string(),
                found: envelope.version,
            });
        }

        info!(
            file = ?self.path,
            saved_at = %envelope.saved_at,
            policies = envelope.state.policies.len(),
            claims = envelope.state.claims.len(),
            "Snapshot loaded"
        );
        Ok(envelope.state)
    }

    /// Writes to a temporary file, then renames over the target
    pub async fn save(&self, state: &StoreState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let envelope = SnapshotEnvelope {
            version: SNAPSHOT_VERSION.to_string(),
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let serialized = serde_json::to_string_pretty(&envelope)?;

        let temp_file = format!("{}.tmp", self.path.display());
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &self.path).await?;

        info!(file = ?self.path, "Snapshot saved");
        Ok(())
    }
}
