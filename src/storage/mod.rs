pub mod csv_file;
pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use csv_file::CsvFileStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Trade, TradeDocument};

/// Whole-ledger persistence: read everything, overwrite everything.
pub trait SnapshotStore {
    fn load(&self) -> Result<Vec<Trade>>;

    fn save(&self, trades: &[Trade]) -> Result<()>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn load(&self) -> Result<Vec<Trade>> {
        (**self).load()
    }

    fn save(&self, trades: &[Trade]) -> Result<()> {
        (**self).save(trades)
    }
}

/// Per-record, multi-user document store.
#[async_trait]
pub trait RemoteTradeStore: Send + Sync {
    /// Insert a document for `owner_id` and return the id the store assigned.
    async fn create(&self, owner_id: &str, trade: &TradeDocument) -> Result<String>;

    /// Overwrite the stored fields of an existing document.
    async fn update(&self, id: &str, trade: &TradeDocument) -> Result<()>;

    /// Remove a document. Unknown ids are not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// All of an owner's documents in creation order.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Trade>>;
}
