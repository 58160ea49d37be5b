use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::documents::DocumentSettings;
use crate::entities::{Coverage, CoverageCatalog, RepositorySettings};
use crate::errors::DeskError;
use crate::notifications::NotificationSettings;
use crate::workflows::{ClaimStatusCatalog, ClaimStatusDef, WorkflowSettings};

pub const DEFAULT_CONFIG_FILE: &str = "agency-desk.toml";

/// Main configuration structure for agency-desk
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeskConfig {
    /// Policy workflow rules
    pub workflow: WorkflowConfig,
    /// Claim catalogs and filing rules
    pub claims: ClaimsConfig,
    /// Object storage for document binaries
    pub storage: StorageConfig,
    /// Outbound notifications
    pub notifications: NotificationsConfig,
    /// Listing limits
    pub listing: ListingConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Store snapshot used by the CLI
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Lifetime of the edit grant issued on rejection
    pub edit_window_hours: i64,
    /// Minimum trimmed length of a rejection reason
    pub min_rejection_reason: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClaimsConfig {
    /// Days after the incident during which a claim may be filed
    pub filing_window_days: i64,
    pub statuses: Vec<ClaimStatusDef>,
    /// Coverage codes offered per line of business
    pub coverages: BTreeMap<String, Vec<Coverage>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory of the local object store
    pub root: String,
    /// Upper bound on a single storage call
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    pub agency_name: String,
    /// Country calling code for ten-digit phone numbers
    pub country_code: String,
    /// Upper bound on a single delivery attempt
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    pub max_page_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    pub state_file: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                edit_window_hours: 24,
                min_rejection_reason: 10,
            },
            claims: ClaimsConfig {
                filing_window_days: 60,
                statuses: ClaimStatusCatalog::default().statuses().to_vec(),
                coverages: CoverageCatalog::default().as_map().clone(),
            },
            storage: StorageConfig {
                root: ".agency-desk/objects".to_string(),
                timeout_ms: 5_000,
            },
            notifications: NotificationsConfig {
                agency_name: "Agencia de Seguros".to_string(),
                country_code: "52".to_string(),
                send_timeout_ms: 5_000,
            },
            listing: ListingConfig { max_page_size: 100 },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            persistence: PersistenceConfig {
                state_file: ".agency-desk/state.json".to_string(),
            },
        }
    }
}

impl DeskConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or agency-desk.toml when present)
    /// 3. Environment variables (AGENCY_DESK_<SECTION>__<KEY>)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path.to_path_buf()));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name("agency-desk"));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("AGENCY_DESK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: DeskConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DeskError> {
        if self.workflow.edit_window_hours <= 0 {
            return Err(DeskError::validation("workflow.edit_window_hours must be positive"));
        }
        if self.claims.filing_window_days <= 0 {
            return Err(DeskError::validation("claims.filing_window_days must be positive"));
        }
        if self.listing.max_page_size == 0 {
            return Err(DeskError::validation("listing.max_page_size must be positive"));
        }
        self.status_catalog()?;
        Ok(())
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            edit_window: chrono::Duration::hours(self.workflow.edit_window_hours),
            min_rejection_reason: self.workflow.min_rejection_reason,
        }
    }

    pub fn repository_settings(&self) -> RepositorySettings {
        RepositorySettings {
            filing_window_days: self.claims.filing_window_days,
            max_page_size: self.listing.max_page_size,
        }
    }

    pub fn document_settings(&self) -> DocumentSettings {
        DocumentSettings {
            storage_timeout: Duration::from_millis(self.storage.timeout_ms),
        }
    }

    pub fn notification_settings(&self) -> NotificationSettings {
        NotificationSettings {
            agency_name: self.notifications.agency_name.clone(),
            country_code: self.notifications.country_code.clone(),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.notifications.send_timeout_ms)
    }

    pub fn status_catalog(&self) -> Result<ClaimStatusCatalog, DeskError> {
        ClaimStatusCatalog::new(self.claims.statuses.clone())
    }

    pub fn coverage_catalog(&self) -> CoverageCatalog {
        CoverageCatalog::new(self.claims.coverages.clone())
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(&self.storage.root)
    }

    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(&self.persistence.state_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = DeskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workflow_settings().edit_window, chrono::Duration::hours(24));
        assert_eq!(config.repository_settings().filing_window_days, 60);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desk.toml");
        std::fs::write(
            &path,
            "[workflow]\nedit_window_hours = 48\nmin_rejection_reason = 20\n",
        )
        .unwrap();

        let config = DeskConfig::load(Some(&path)).unwrap();
        assert_eq!(config.workflow.edit_window_hours, 48);
        assert_eq!(config.workflow.min_rejection_reason, 20);
        assert_eq!(config.listing.max_page_size, 100);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = DeskConfig::default();
        config.notifications.agency_name = "Seguros del Valle".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = DeskConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.notifications.agency_name, "Seguros del Valle");
        assert_eq!(loaded.claims.statuses.len(), config.claims.statuses.len());
    }
}
