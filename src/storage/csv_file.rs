use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Trade, TradeType};
use crate::storage::SnapshotStore;

/// Flat CSV row. Every row has the same columns, notes may be blank.
#[derive(Debug, Serialize, Deserialize)]
struct CsvTradeRow {
    id: String,
    date: NaiveDate,
    symbol: String,
    #[serde(rename = "type")]
    trade_type: TradeType,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    pnl: f64,
    pnl_percentage: f64,
    notes: Option<String>,
}

impl From<&Trade> for CsvTradeRow {
    fn from(trade: &Trade) -> Self {
        Self {
            id: trade.id.clone(),
            date: trade.date,
            symbol: trade.symbol.clone(),
            trade_type: trade.trade_type,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            quantity: trade.quantity,
            pnl: trade.pnl,
            pnl_percentage: trade.pnl_percentage,
            notes: trade.notes.clone(),
        }
    }
}

impl From<CsvTradeRow> for Trade {
    fn from(row: CsvTradeRow) -> Self {
        Trade {
            id: row.id,
            symbol: row.symbol,
            trade_type: row.trade_type,
            entry_price: row.entry_price,
            exit_price: row.exit_price,
            quantity: row.quantity,
            date: row.date,
            notes: row.notes.filter(|n| !n.is_empty()),
            pnl: row.pnl,
            pnl_percentage: row.pnl_percentage,
        }
    }
}

/// Ledger snapshot as a CSV sheet with a header row.
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for CsvFileStore {
    fn load(&self) -> Result<Vec<Trade>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut trades = Vec::new();
        for row in reader.deserialize::<CsvTradeRow>() {
            trades.push(row?.into());
        }
        Ok(trades)
    }

    fn save(&self, trades: &[Trade]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for trade in trades {
                writer.serialize(CsvTradeRow::from(trade))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        log::debug!("Saved {} trades to {}", trades.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trade(id: &str, notes: Option<&str>) -> Trade {
        Trade {
            id: id.to_string(),
            symbol: "EURUSD".to_string(),
            trade_type: TradeType::Short,
            entry_price: 1.095,
            exit_price: 1.09,
            quantity: 10000.0,
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            notes: notes.map(str::to_string),
            pnl: 50.0,
            pnl_percentage: 0.4566,
        }
    }

    #[test]
    fn test_save_and_load_with_and_without_notes() {
        let dir = TempDir::new().unwrap();
        let store = CsvFileStore::new(dir.path().join("trades.csv"));

        let trades = vec![trade("a", Some("fade, London open")), trade("b", None)];
        store.save(&trades).unwrap();

        assert_eq!(store.load().unwrap(), trades);
    }

    #[test]
    fn test_header_row() {
        let dir = TempDir::new().unwrap();
        let store = CsvFileStore::new(dir.path().join("trades.csv"));
        store.save(&[trade("a", None)]).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.starts_with(
            "id,date,symbol,type,entry_price,exit_price,quantity,pnl,pnl_percentage,notes"
        ));
        assert!(contents.contains(",SHORT,"));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(CsvFileStore::new(dir.path().join("none.csv")).load().unwrap().is_empty());
    }
}
