use std::collections::HashMap;

use crate::error::{LedgerError, Result};
use crate::ledger::{generate_trade_id, Applied, TradeBook};
use crate::models::{NewTrade, Trade, TradeFilters, TradeInput, TradeUpdate};
use crate::stats::{self, DailyGroups, TradeSummary};
use crate::storage::RemoteTradeStore;

/// A store call that failed and is still owed for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PendingChange {
    /// Never reached the store; the record still has its provisional id.
    Create,
    Update,
    Delete,
}

/// Owner-scoped ledger mirrored record by record to a `RemoteTradeStore`.
///
/// Mutations land in memory first; the store call that follows reports its
/// outcome separately through `Applied::persisted`. Failed calls are kept as
/// pending changes until `sync_pending` delivers them. Concurrent writers to
/// the same record resolve as last-writer-wins.
pub struct RemoteLedger<R: RemoteTradeStore> {
    store: R,
    owner_id: String,
    book: TradeBook,
    pending: HashMap<String, PendingChange>,
}

impl<R: RemoteTradeStore> RemoteLedger<R> {
    pub async fn open(store: R, owner_id: impl Into<String>) -> Result<Self> {
        let owner_id = owner_id.into();
        let book = TradeBook::from_records(store.list_by_owner(&owner_id).await?);

        log::info!("Loaded {} trades for owner {}", book.len(), owner_id);

        Ok(Self {
            store,
            owner_id,
            book,
            pending: HashMap::new(),
        })
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn trades(&self) -> &[Trade] {
        self.book.trades()
    }

    pub fn get_trade(&self, id: &str) -> Option<&Trade> {
        self.book.get(id)
    }

    pub fn query(&self, filters: &TradeFilters) -> Vec<&Trade> {
        self.book.query(filters)
    }

    /// The store change owed for `id`, if its last store call failed.
    pub fn pending_change(&self, id: &str) -> Option<PendingChange> {
        self.pending.get(id).copied()
    }

    pub fn is_synced(&self) -> bool {
        self.pending.is_empty()
    }

    /// Insert under a provisional id, then adopt the id the store assigns.
    ///
    /// If the store call fails the trade keeps its provisional id and stays
    /// pending until an update or `sync_pending` creates it.
    pub async fn record_trade(&mut self, trade: NewTrade) -> Result<Applied<Trade>> {
        let provisional = self.book.insert(generate_trade_id(), trade)?;
        self.pending.insert(provisional.id.clone(), PendingChange::Create);

        match self.push_create(&provisional.id).await {
            Ok(trade) => {
                log::info!("Recorded trade {} for {}", trade.id, self.owner_id);
                Ok(Applied {
                    value: trade,
                    persisted: Ok(()),
                })
            }
            Err(e) => {
                log::error!("Failed to store trade {}: {}", provisional.id, e);
                Ok(Applied {
                    value: provisional,
                    persisted: Err(e),
                })
            }
        }
    }

    pub async fn record_form(&mut self, input: &TradeInput) -> Result<Applied<Trade>> {
        let trade = input.parse()?;
        self.record_trade(trade).await
    }

    /// Apply in memory, then send the full record. A record whose create is
    /// still pending is created instead, and the returned trade carries the
    /// store id.
    pub async fn update_trade(&mut self, id: &str, update: &TradeUpdate) -> Result<Applied<Trade>> {
        let trade = self.book.update(id, update)?;

        if self.pending_change(id) == Some(PendingChange::Create) {
            return Ok(match self.push_create(id).await {
                Ok(created) => Applied {
                    value: created,
                    persisted: Ok(()),
                },
                Err(e) => {
                    log::error!("Failed to store trade {}: {}", id, e);
                    Applied {
                        value: trade,
                        persisted: Err(e),
                    }
                }
            });
        }

        let persisted = self.store.update(id, &trade.to_document()).await;
        self.settle(id, PendingChange::Update, &persisted);
        if let Err(e) = &persisted {
            log::error!("Failed to store update of trade {}: {}", id, e);
        }

        Ok(Applied { value: trade, persisted })
    }

    /// Remove by id. A record that never reached the store needs no store call.
    pub async fn delete_trade(&mut self, id: &str) -> Applied<Option<Trade>> {
        let Some(trade) = self.book.remove(id) else {
            return Applied {
                value: None,
                persisted: Ok(()),
            };
        };

        if self.pending.get(id) == Some(&PendingChange::Create) {
            self.pending.remove(id);
            log::debug!("Dropped unsynced trade {}", id);
            return Applied {
                value: Some(trade),
                persisted: Ok(()),
            };
        }

        let persisted = self.store.delete(id).await;
        self.settle(id, PendingChange::Delete, &persisted);
        if let Err(e) = &persisted {
            log::error!("Failed to delete stored trade {}: {}", id, e);
        }

        Applied {
            value: Some(trade),
            persisted,
        }
    }

    /// Retry every pending store change. Creates go first, in ledger order.
    ///
    /// Stops at the first failure; changes delivered before it stay delivered.
    /// Returns how many changes were delivered.
    pub async fn sync_pending(&mut self) -> Result<usize> {
        let creates: Vec<String> = self
            .book
            .trades()
            .iter()
            .filter(|t| self.pending.get(&t.id) == Some(&PendingChange::Create))
            .map(|t| t.id.clone())
            .collect();
        let mut others: Vec<(String, PendingChange)> = self
            .pending
            .iter()
            .filter(|(_, change)| **change != PendingChange::Create)
            .map(|(id, change)| (id.clone(), *change))
            .collect();
        others.sort();

        let mut delivered = 0;
        for id in creates {
            self.push_create(&id).await?;
            delivered += 1;
        }
        for (id, change) in others {
            let outcome = match change {
                PendingChange::Update => match self.book.get(&id) {
                    Some(trade) => self.store.update(&id, &trade.to_document()).await,
                    None => Ok(()),
                },
                _ => self.store.delete(&id).await,
            };
            self.settle(&id, change, &outcome);
            outcome?;
            delivered += 1;
        }

        log::info!("Synced {} pending changes for {}", delivered, self.owner_id);
        Ok(delivered)
    }

    pub fn summary(&self) -> TradeSummary {
        stats::compute_summary(self.trades())
    }

    pub fn daily(&self) -> DailyGroups {
        stats::group_by_date(self.trades())
    }

    /// Create a provisional record in the store and adopt the assigned id.
    async fn push_create(&mut self, id: &str) -> Result<Trade> {
        let document = self
            .book
            .get(id)
            .map(Trade::to_document)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        let remote_id = self.store.create(&self.owner_id, &document).await?;
        self.pending.remove(id);
        self.book
            .rename(id, remote_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    fn settle(&mut self, id: &str, change: PendingChange, outcome: &Result<()>) {
        if outcome.is_ok() {
            self.pending.remove(id);
        } else {
            self.pending.insert(id.to_string(), change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::models::TradeDocument;
    use crate::storage::SqliteStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store that is always unreachable.
    struct OfflineStore;

    #[async_trait]
    impl RemoteTradeStore for OfflineStore {
        async fn create(&self, _owner_id: &str, _trade: &TradeDocument) -> Result<String> {
            Err(LedgerError::Persistence("offline".to_string()))
        }

        async fn update(&self, _id: &str, _trade: &TradeDocument) -> Result<()> {
            Err(LedgerError::Persistence("offline".to_string()))
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            Err(LedgerError::Persistence("offline".to_string()))
        }

        async fn list_by_owner(&self, _owner_id: &str) -> Result<Vec<Trade>> {
            Ok(Vec::new())
        }
    }

    /// SQLite-backed store that can be taken offline.
    struct SwitchableStore {
        inner: SqliteStore,
        offline: AtomicBool,
    }

    impl SwitchableStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::open_in_memory("unused").unwrap(),
                offline: AtomicBool::new(false),
            }
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(LedgerError::Persistence("offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteTradeStore for SwitchableStore {
        async fn create(&self, owner_id: &str, trade: &TradeDocument) -> Result<String> {
            self.check()?;
            self.inner.create(owner_id, trade).await
        }

        async fn update(&self, id: &str, trade: &TradeDocument) -> Result<()> {
            self.check()?;
            self.inner.update(id, trade).await
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.check()?;
            self.inner.delete(id).await
        }

        async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Trade>> {
            self.check()?;
            self.inner.list_by_owner(owner_id).await
        }
    }

    fn new_trade(symbol: &str, exit: f64) -> NewTrade {
        NewTrade {
            symbol: symbol.to_string(),
            trade_type: crate::models::TradeType::Long,
            entry_price: 100.0,
            exit_price: exit,
            quantity: 2.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_record_adopts_store_id() {
        let store = SqliteStore::open_in_memory("unused").unwrap();
        let mut ledger = RemoteLedger::open(store, "alice").await.unwrap();

        let trade = ledger
            .record_trade(new_trade("AAPL", 110.0))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let stored = ledger.store().list_by_owner("alice").await.unwrap();
        assert_eq!(stored, vec![trade.clone()]);
        assert_eq!(ledger.trades(), &[trade.clone()]);
        assert_eq!(trade.pnl, 20.0);
    }

    #[tokio::test]
    async fn test_update_and_delete_mirror_to_store() {
        let store = SqliteStore::open_in_memory("unused").unwrap();
        let mut ledger = RemoteLedger::open(store, "alice").await.unwrap();
        let trade = ledger
            .record_trade(new_trade("AAPL", 110.0))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let update = TradeUpdate {
            exit_price: Some(95.0),
            ..Default::default()
        };
        let updated = ledger.update_trade(&trade.id, &update).await.unwrap().into_result().unwrap();
        assert_eq!(updated.pnl, -10.0);
        assert_eq!(ledger.store().list_by_owner("alice").await.unwrap()[0].pnl, -10.0);

        assert!(ledger.delete_trade("missing").await.value.is_none());
        ledger.delete_trade(&trade.id).await.into_result().unwrap();
        assert!(ledger.store().list_by_owner("alice").await.unwrap().is_empty());
        assert_eq!(ledger.summary().total_trades, 0);
    }

    #[tokio::test]
    async fn test_reopen_loads_owner_trades() {
        let store = SqliteStore::open_in_memory("unused").unwrap();
        let mut ledger = RemoteLedger::open(store, "alice").await.unwrap();
        ledger.record_trade(new_trade("AAPL", 110.0)).await.unwrap().into_result().unwrap();
        ledger.record_trade(new_trade("MSFT", 90.0)).await.unwrap().into_result().unwrap();

        let store = ledger.store;
        let reopened = RemoteLedger::open(store, "alice").await.unwrap();
        assert_eq!(reopened.trades().len(), 2);
        assert_eq!(reopened.trades()[0].symbol, "AAPL");
        assert_eq!(reopened.daily().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_keeps_local_state() {
        let mut ledger = RemoteLedger::open(OfflineStore, "alice").await.unwrap();

        let outcome = ledger.record_trade(new_trade("AAPL", 110.0)).await.unwrap();
        assert!(!outcome.is_persisted());
        let id = outcome.value.id.clone();
        assert!(ledger.get_trade(&id).is_some());

        let update = TradeUpdate {
            quantity: Some(4.0),
            ..Default::default()
        };
        let outcome = ledger.update_trade(&id, &update).await.unwrap();
        assert!(outcome.persisted.unwrap_err().is_persistence());
        assert_eq!(ledger.get_trade(&id).unwrap().pnl, 40.0);

        assert_eq!(ledger.pending_change(&id), Some(PendingChange::Create));

        // Never stored, so nothing is owed once it is gone locally
        let outcome = ledger.delete_trade(&id).await;
        assert!(outcome.is_persisted());
        assert!(ledger.trades().is_empty());
        assert!(ledger.is_synced());
    }

    #[tokio::test]
    async fn test_failed_create_syncs_after_reconnect() {
        let store = SwitchableStore::new();
        store.set_offline(true);
        let mut ledger = RemoteLedger::open(store, "alice").await.unwrap();

        let outcome = ledger.record_trade(new_trade("AAPL", 110.0)).await.unwrap();
        assert!(!outcome.is_persisted());
        let provisional = outcome.value.id.clone();
        ledger.record_trade(new_trade("MSFT", 90.0)).await.unwrap().persisted.unwrap_err();
        assert!(!ledger.is_synced());

        assert!(ledger.sync_pending().await.unwrap_err().is_persistence());

        ledger.store().set_offline(false);
        assert_eq!(ledger.sync_pending().await.unwrap(), 2);
        assert!(ledger.is_synced());
        assert!(ledger.get_trade(&provisional).is_none());

        let stored = ledger.store().list_by_owner("alice").await.unwrap();
        assert_eq!(stored, ledger.trades().to_vec());
        assert_eq!(stored[0].symbol, "AAPL");
        assert_eq!(ledger.sync_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_creates_record_that_never_reached_store() {
        let store = SwitchableStore::new();
        store.set_offline(true);
        let mut ledger = RemoteLedger::open(store, "alice").await.unwrap();
        let provisional = ledger.record_trade(new_trade("AAPL", 110.0)).await.unwrap().value.id;

        ledger.store().set_offline(false);
        let update = TradeUpdate {
            quantity: Some(1.0),
            ..Default::default()
        };
        let trade = ledger
            .update_trade(&provisional, &update)
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_ne!(trade.id, provisional);
        assert_eq!(trade.pnl, 10.0);
        assert!(ledger.is_synced());
        let stored = ledger.store().list_by_owner("alice").await.unwrap();
        assert_eq!(stored, vec![trade]);
    }

    #[tokio::test]
    async fn test_failed_update_and_delete_are_retried() {
        let mut ledger = RemoteLedger::open(SwitchableStore::new(), "alice").await.unwrap();
        let kept = ledger.record_trade(new_trade("AAPL", 110.0)).await.unwrap().into_result().unwrap();
        let dropped = ledger.record_trade(new_trade("MSFT", 90.0)).await.unwrap().into_result().unwrap();

        ledger.store().set_offline(true);
        let update = TradeUpdate {
            exit_price: Some(120.0),
            ..Default::default()
        };
        assert!(!ledger.update_trade(&kept.id, &update).await.unwrap().is_persisted());
        assert!(!ledger.delete_trade(&dropped.id).await.is_persisted());
        assert_eq!(ledger.pending_change(&kept.id), Some(PendingChange::Update));
        assert_eq!(ledger.pending_change(&dropped.id), Some(PendingChange::Delete));

        ledger.store().set_offline(false);
        assert_eq!(ledger.sync_pending().await.unwrap(), 2);

        let stored = ledger.store().list_by_owner("alice").await.unwrap();
        assert_eq!(stored, ledger.trades().to_vec());
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].pnl, 40.0);
    }

    #[tokio::test]
    async fn test_validation_happens_before_store_call() {
        let mut ledger = RemoteLedger::open(OfflineStore, "alice").await.unwrap();
        let err = ledger.record_trade(new_trade("", 110.0)).await.unwrap_err();
        assert!(err.is_validation());
        assert!(ledger.trades().is_empty());
    }
}
