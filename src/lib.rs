pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod stats;
pub mod storage;
pub mod sync;

pub use config::{LedgerConfig, StorageBackend};
pub use error::{LedgerError, Result};
pub use ledger::{Applied, Ledger};
pub use models::{NewTrade, Trade, TradeFilters, TradeInput, TradeType, TradeUpdate};
pub use stats::{compute_summary, equity_curve, group_by_date, CalendarMonth, TradeSummary};
pub use storage::{RemoteTradeStore, SnapshotStore};
pub use sync::{PendingChange, RemoteLedger};

/// Build the session ledger over the storage backend named in `config`.
pub fn open_ledger(config: &LedgerConfig) -> Result<Ledger<Box<dyn SnapshotStore>>> {
    log::info!("Opening ledger with {:?} storage", config.storage);
    Ledger::open(config.open_snapshot_store()?)
}
