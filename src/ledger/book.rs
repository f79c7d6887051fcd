use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::ledger::pnl::derive_trade;
use crate::models::{NewTrade, Trade, TradeFilters, TradeUpdate};

pub fn generate_trade_id() -> String {
    format!("TRADE-{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}

/// Ordered in-memory trade collection shared by the local and remote ledgers.
#[derive(Debug, Clone, Default)]
pub struct TradeBook {
    trades: Vec<Trade>,
}

impl TradeBook {
    /// Rebuild from persisted records, re-deriving P&L.
    ///
    /// Records that no longer validate, or repeat an earlier id, are dropped
    /// with a warning.
    pub fn from_records(records: Vec<Trade>) -> Self {
        let mut seen = HashSet::new();
        let mut trades = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.id.clone()) {
                log::warn!("Skipping duplicate trade id {} in snapshot", record.id);
                continue;
            }

            match record.to_new_trade().validate() {
                Ok(valid) => trades.push(derive_trade(record.id, valid)),
                Err(e) => log::warn!("Skipping invalid trade {} in snapshot: {}", record.id, e),
            }
        }

        Self { trades }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Trade> {
        self.trades.iter().find(|t| t.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.trades.iter().position(|t| t.id == id)
    }

    pub fn insert(&mut self, id: String, trade: NewTrade) -> Result<Trade> {
        let valid = trade.validate()?;
        if self.position(&id).is_some() {
            return Err(LedgerError::validation("id", format!("'{}' already exists", id)));
        }

        let trade = derive_trade(id, valid);
        self.trades.push(trade.clone());
        Ok(trade)
    }

    pub fn update(&mut self, id: &str, update: &TradeUpdate) -> Result<Trade> {
        let index = self
            .position(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        let merged = update.merge_into(&self.trades[index]).validate()?;
        let trade = derive_trade(id.to_string(), merged);
        self.trades[index] = trade.clone();
        Ok(trade)
    }

    pub fn remove(&mut self, id: &str) -> Option<Trade> {
        self.position(id).map(|index| self.trades.remove(index))
    }

    /// Swap a provisional id for the one assigned by a backing store.
    pub fn rename(&mut self, from: &str, to: String) -> Option<&Trade> {
        let index = self.position(from)?;
        self.trades[index].id = to;
        Some(&self.trades[index])
    }

    pub fn query(&self, filters: &TradeFilters) -> Vec<&Trade> {
        let matching = self.trades.iter().filter(|t| filters.matches(t));
        match filters.window() {
            Some((offset, limit)) => matching.skip(offset).take(limit).collect(),
            None => matching.collect(),
        }
    }
}
