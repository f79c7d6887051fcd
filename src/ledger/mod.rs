pub mod book;
pub mod pnl;
pub mod validation;

pub use book::{generate_trade_id, TradeBook};
pub use pnl::{compute_pnl, Pnl};

use crate::error::Result;
use crate::models::{NewTrade, Trade, TradeFilters, TradeInput, TradeUpdate};
use crate::stats::{self, DailyGroups, TradeSummary};
use crate::storage::SnapshotStore;

/// Outcome of a ledger mutation.
///
/// The in-memory change in `value` has already been applied; `persisted`
/// carries the result of the storage call that followed it.
#[must_use]
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub persisted: Result<()>,
}

impl<T> Applied<T> {
    pub fn is_persisted(&self) -> bool {
        self.persisted.is_ok()
    }

    /// Collapse into a single result, failing if persistence failed.
    pub fn into_result(self) -> Result<T> {
        self.persisted.map(|_| self.value)
    }
}

/// The session's trade ledger, snapshotted to a `SnapshotStore` after each change.
pub struct Ledger<S: SnapshotStore> {
    store: S,
    book: TradeBook,
}

impl<S: SnapshotStore> Ledger<S> {
    pub fn open(store: S) -> Result<Self> {
        let records = store.load()?;
        let loaded = records.len();
        let book = TradeBook::from_records(records);

        log::info!("Ledger opened with {} trades ({} in snapshot)", book.len(), loaded);

        Ok(Self { store, book })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn trades(&self) -> &[Trade] {
        self.book.trades()
    }

    pub fn len(&self) -> usize {
        self.book.len()
    }

    pub fn is_empty(&self) -> bool {
        self.book.is_empty()
    }

    pub fn get_trade(&self, id: &str) -> Option<&Trade> {
        self.book.get(id)
    }

    pub fn query(&self, filters: &TradeFilters) -> Vec<&Trade> {
        self.book.query(filters)
    }

    /// Validate, derive P&L and append. Validation errors leave the ledger untouched.
    pub fn record_trade(&mut self, trade: NewTrade) -> Result<Applied<Trade>> {
        let trade = self.book.insert(generate_trade_id(), trade)?;
        log::info!("Recorded trade {} ({} {})", trade.id, trade.trade_type, trade.symbol);

        Ok(Applied {
            value: trade,
            persisted: self.persist(),
        })
    }

    /// Same as `record_trade`, from raw form strings.
    pub fn record_form(&mut self, input: &TradeInput) -> Result<Applied<Trade>> {
        let trade = input.parse()?;
        self.record_trade(trade)
    }

    pub fn update_trade(&mut self, id: &str, update: &TradeUpdate) -> Result<Applied<Trade>> {
        let trade = self.book.update(id, update)?;
        log::info!("Updated trade {}", id);

        Ok(Applied {
            value: trade,
            persisted: self.persist(),
        })
    }

    /// Remove by id. Unknown ids are a no-op and skip the snapshot write.
    pub fn delete_trade(&mut self, id: &str) -> Applied<Option<Trade>> {
        match self.book.remove(id) {
            Some(trade) => {
                log::info!("Deleted trade {}", id);
                Applied {
                    value: Some(trade),
                    persisted: self.persist(),
                }
            }
            None => {
                log::debug!("Delete ignored, no trade with id {}", id);
                Applied {
                    value: None,
                    persisted: Ok(()),
                }
            }
        }
    }

    pub fn summary(&self) -> TradeSummary {
        stats::compute_summary(self.trades())
    }

    pub fn daily(&self) -> DailyGroups {
        stats::group_by_date(self.trades())
    }

    /// Write the current contents to the store, e.g. after a failed save.
    pub fn flush(&self) -> Result<()> {
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        self.store.save(self.book.trades()).inspect_err(|e| {
            log::error!("Failed to save ledger snapshot: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::models::TradeType;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl SnapshotStore for FlakyStore {
        fn load(&self) -> Result<Vec<Trade>> {
            self.inner.load()
        }

        fn save(&self, trades: &[Trade]) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(LedgerError::Persistence("disk full".to_string()));
            }
            self.inner.save(trades)
        }
    }

    fn form(symbol: &str, trade_type: &str, entry: &str, exit: &str, qty: &str) -> TradeInput {
        TradeInput {
            symbol: symbol.to_string(),
            trade_type: trade_type.to_string(),
            entry_price: entry.to_string(),
            exit_price: exit.to_string(),
            quantity: qty.to_string(),
            date: "2024-01-05".to_string(),
            notes: None,
        }
    }

    fn open() -> Ledger<MemoryStore> {
        Ledger::open(MemoryStore::default()).unwrap()
    }

    #[test]
    fn test_record_long_trade() {
        let mut ledger = open();
        let trade = ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap()
            .into_result()
            .unwrap();

        assert!((trade.pnl - 100.0).abs() < 1e-9);
        assert!((trade.pnl_percentage - 10.0).abs() < 1e-9);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.store().snapshot().unwrap(), ledger.trades().to_vec());
    }

    #[test]
    fn test_record_short_trade() {
        let mut ledger = open();
        let trade = ledger
            .record_form(&form("ES", "SHORT", "100", "90", "5"))
            .unwrap()
            .into_result()
            .unwrap();

        assert!((trade.pnl - 50.0).abs() < 1e-9);
        assert!((trade.pnl_percentage - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_failure_is_not_applied() {
        let mut ledger = open();
        let err = ledger
            .record_form(&form("AAPL", "LONG", "0", "110", "10"))
            .unwrap_err();

        assert!(err.is_validation());
        assert!(ledger.is_empty());
        assert!(ledger.store().snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let mut ledger = open();
        ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap()
            .into_result()
            .unwrap();
        let before = ledger.trades().to_vec();

        let outcome = ledger.delete_trade("TRADE-missing");
        assert!(outcome.value.is_none());
        assert!(outcome.is_persisted());
        assert_eq!(ledger.trades(), before.as_slice());
    }

    #[test]
    fn test_record_then_delete_restores_contents() {
        let mut ledger = open();
        for symbol in ["AAPL", "MSFT"] {
            ledger
                .record_form(&form(symbol, "LONG", "10", "11", "1"))
                .unwrap()
                .into_result()
                .unwrap();
        }
        let before = ledger.trades().to_vec();

        let added = ledger
            .record_form(&form("NVDA", "SHORT", "10", "9", "1"))
            .unwrap()
            .into_result()
            .unwrap();
        let removed = ledger.delete_trade(&added.id).into_result().unwrap();

        assert_eq!(removed, Some(added));
        assert_eq!(ledger.trades(), before.as_slice());
        assert_eq!(ledger.store().snapshot().unwrap(), before);
    }

    #[test]
    fn test_update_recomputes_pnl_in_place() {
        let mut ledger = open();
        let first = ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap()
            .into_result()
            .unwrap();
        ledger
            .record_form(&form("MSFT", "LONG", "10", "11", "1"))
            .unwrap()
            .into_result()
            .unwrap();

        let update = TradeUpdate {
            trade_type: Some(TradeType::Short),
            exit_price: Some(90.0),
            ..Default::default()
        };
        let updated = ledger.update_trade(&first.id, &update).unwrap().into_result().unwrap();

        assert_eq!(updated.id, first.id);
        assert!((updated.pnl - 100.0).abs() < 1e-9);
        assert_eq!(ledger.trades()[0], updated);
    }

    #[test]
    fn test_update_errors() {
        let mut ledger = open();
        let missing = ledger.update_trade("nope", &TradeUpdate::default()).unwrap_err();
        assert!(matches!(missing, LedgerError::NotFound(_)));

        let trade = ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap()
            .into_result()
            .unwrap();
        let bad = TradeUpdate {
            quantity: Some(-1.0),
            ..Default::default()
        };
        assert!(ledger.update_trade(&trade.id, &bad).unwrap_err().is_validation());
        assert_eq!(ledger.get_trade(&trade.id), Some(&trade));
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let store = FlakyStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let mut ledger = Ledger::open(store).unwrap();

        let outcome = ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap();
        assert!(!outcome.is_persisted());
        let id = outcome.value.id.clone();
        assert!(outcome.into_result().unwrap_err().is_persistence());

        // The trade stays in the session even though the snapshot failed
        assert!(ledger.get_trade(&id).is_some());
        assert!(ledger.store().inner.snapshot().unwrap().is_empty());

        ledger.store().failing.store(false, Ordering::SeqCst);
        assert!(ledger.delete_trade(&id).is_persisted());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_flush_retries_failed_save() {
        let store = FlakyStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let mut ledger = Ledger::open(store).unwrap();

        let outcome = ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap();
        assert!(!outcome.is_persisted());
        assert!(ledger.flush().unwrap_err().is_persistence());

        ledger.store().failing.store(false, Ordering::SeqCst);
        ledger.flush().unwrap();
        assert_eq!(ledger.store().inner.snapshot().unwrap(), ledger.trades().to_vec());
    }

    #[test]
    fn test_open_loads_snapshot() {
        let mut ledger = open();
        ledger
            .record_form(&form("AAPL", "LONG", "100", "110", "10"))
            .unwrap()
            .into_result()
            .unwrap();

        let reopened = Ledger::open(ledger.store().clone()).unwrap();
        assert_eq!(reopened.trades(), ledger.trades());
        assert_eq!(reopened.summary().total_trades, 1);
        assert_eq!(
            reopened.daily().keys().copied().collect::<Vec<_>>(),
            vec![NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()]
        );
    }
}
