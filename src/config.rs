use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::storage::{CsvFileStore, JsonFileStore, MemoryStore, SnapshotStore, SqliteStore};

pub const DATA_DIR_ENV: &str = "TRADE_LEDGER_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".trade-ledger";

/// Where the ledger snapshot lives. Chosen once, when the session is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageBackend {
    Json { path: PathBuf },
    Csv { path: PathBuf },
    Sqlite { path: PathBuf },
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::Json {
            path: data_dir().join(crate::storage::json_file::DEFAULT_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_owner_id() -> String {
    "local".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::default(),
            owner_id: default_owner_id(),
            currency: default_currency(),
        }
    }
}

/// `$TRADE_LEDGER_DATA_DIR`, falling back to `./.trade-ledger`.
pub fn data_dir() -> PathBuf {
    env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

impl LedgerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: LedgerConfig = serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("invalid config {}: {}", path.display(), e)))?;

        if config.owner_id.trim().is_empty() {
            return Err(LedgerError::Config("owner_id must not be empty".to_string()));
        }

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given and present, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                log::warn!("Config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn open_snapshot_store(&self) -> Result<Box<dyn SnapshotStore>> {
        let store: Box<dyn SnapshotStore> = match &self.storage {
            StorageBackend::Json { path } => Box::new(JsonFileStore::new(path)),
            StorageBackend::Csv { path } => Box::new(CsvFileStore::new(path)),
            StorageBackend::Sqlite { path } => Box::new(SqliteStore::open(path, self.owner_id.clone())?),
            StorageBackend::Memory => Box::new(MemoryStore::default()),
        };
        Ok(store)
    }
}
