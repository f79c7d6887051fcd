use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Long,
    Short,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Long => "LONG",
            TradeType::Short => "SHORT",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(TradeType::Long),
            "SHORT" => Ok(TradeType::Short),
            other => Err(LedgerError::validation(
                "type",
                format!("expected LONG or SHORT, got '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    #[serde(alias = "entryPrice")]
    pub entry_price: f64,
    #[serde(alias = "exitPrice")]
    pub exit_price: f64,
    pub quantity: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    // Derived, recomputed whenever the trade enters a ledger
    #[serde(default)]
    pub pnl: f64,
    #[serde(default, alias = "pnlPercentage")]
    pub pnl_percentage: f64,
}

impl Trade {
    /// The caller-editable fields of this trade, without id or derived values.
    pub fn to_new_trade(&self) -> NewTrade {
        NewTrade {
            symbol: self.symbol.clone(),
            trade_type: self.trade_type,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            quantity: self.quantity,
            date: self.date,
            notes: self.notes.clone(),
        }
    }

    /// Everything but the id, as stored in a document collection.
    pub fn to_document(&self) -> TradeDocument {
        TradeDocument {
            symbol: self.symbol.clone(),
            trade_type: self.trade_type,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            quantity: self.quantity,
            date: self.date,
            notes: self.notes.clone(),
            pnl: self.pnl,
            pnl_percentage: self.pnl_percentage,
        }
    }
}

/// Typed trade input, before validation and P&L derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Raw form input. Every field arrives as text and is coerced on validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeInput {
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    pub entry_price: String,
    pub exit_price: String,
    pub quantity: String,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update. `None` keeps the current value; `notes: Some("")` clears notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub trade_type: Option<TradeType>,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl TradeUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TradeUpdate::default()
    }

    /// Overlay the provided fields onto an existing trade's inputs.
    pub fn merge_into(&self, current: &Trade) -> NewTrade {
        let mut merged = current.to_new_trade();
        if let Some(symbol) = &self.symbol {
            merged.symbol = symbol.clone();
        }
        if let Some(trade_type) = self.trade_type {
            merged.trade_type = trade_type;
        }
        if let Some(entry_price) = self.entry_price {
            merged.entry_price = entry_price;
        }
        if let Some(exit_price) = self.exit_price {
            merged.exit_price = exit_price;
        }
        if let Some(quantity) = self.quantity {
            merged.quantity = quantity;
        }
        if let Some(date) = self.date {
            merged.date = date;
        }
        if let Some(notes) = &self.notes {
            merged.notes = Some(notes.clone());
        }
        merged
    }
}

/// A trade as held by a remote document store: all fields except the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDocument {
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    pub pnl: f64,
    pub pnl_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilters {
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub trade_type: Option<TradeType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TradeFilters {
    pub fn matches(&self, trade: &Trade) -> bool {
        if let Some(symbol) = &self.symbol {
            let needle = symbol.trim().to_lowercase();
            if !needle.is_empty() && !trade.symbol.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(trade_type) = self.trade_type {
            if trade.trade_type != trade_type {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if trade.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if trade.date > end {
                return false;
            }
        }
        true
    }

    /// `(offset, limit)` when both page and limit are set.
    pub fn window(&self) -> Option<(usize, usize)> {
        match (self.page, self.limit) {
            (Some(page), Some(limit)) => {
                let page = page.max(1) as usize;
                let limit = limit as usize;
                Some(((page - 1) * limit, limit))
            }
            _ => None,
        }
    }
}
