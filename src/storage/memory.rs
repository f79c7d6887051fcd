use std::sync::{Arc, Mutex};

use crate::error::{LedgerError, Result};
use crate::models::Trade;
use crate::storage::SnapshotStore;

/// In-process snapshot store. Clones share the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    trades: Arc<Mutex<Vec<Trade>>>,
}

impl MemoryStore {
    pub fn with_trades(trades: Vec<Trade>) -> Self {
        Self {
            trades: Arc::new(Mutex::new(trades)),
        }
    }

    pub fn snapshot(&self) -> Result<Vec<Trade>> {
        self.load()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Vec<Trade>> {
        let trades = self.trades.lock().map_err(|e| LedgerError::Persistence(e.to_string()))?;
        Ok(trades.clone())
    }

    fn save(&self, trades: &[Trade]) -> Result<()> {
        let mut stored = self.trades.lock().map_err(|e| LedgerError::Persistence(e.to_string()))?;
        *stored = trades.to_vec();
        Ok(())
    }
}
