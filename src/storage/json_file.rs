use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::Trade;
use crate::storage::SnapshotStore;

pub const DEFAULT_FILE_NAME: &str = "tradejournal_trades.json";

/// The whole ledger as one JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Trade>> {
        if !self.path.exists() {
            log::debug!("No snapshot at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, trades: &[Trade]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Write next to the target, then rename over it
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(trades)?)?;
        fs::rename(&tmp, &self.path)?;

        log::debug!("Saved {} trades to {}", trades.len(), self.path.display());
        Ok(())
    }
}
