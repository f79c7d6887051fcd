use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// `None` when there are no losing trades to divide by.
    pub profit_factor: Option<f64>,
    pub best_trade: Option<Trade>,
    pub worst_trade: Option<Trade>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyGroup {
    pub trades: Vec<Trade>,
    pub total_pnl: f64,
}

impl DailyGroup {
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Trades keyed by calendar date, ascending.
pub type DailyGroups = BTreeMap<NaiveDate, DailyGroup>;

pub fn compute_summary<'a, I>(trades: I) -> TradeSummary
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut total_trades = 0usize;
    let mut winning_trades = 0usize;
    let mut total_pnl = 0.0;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut best: Option<&Trade> = None;
    let mut worst: Option<&Trade> = None;

    for trade in trades {
        total_trades += 1;
        total_pnl += trade.pnl;

        if trade.pnl > 0.0 {
            winning_trades += 1;
            gross_profit += trade.pnl;
        } else if trade.pnl < 0.0 {
            gross_loss -= trade.pnl;
        }

        // Ties: best keeps the earliest trade, worst takes the latest
        if best.is_none_or(|b| trade.pnl > b.pnl) {
            best = Some(trade);
        }
        if worst.is_none_or(|w| trade.pnl <= w.pnl) {
            worst = Some(trade);
        }
    }

    let (win_rate, average_pnl) = if total_trades > 0 {
        (
            winning_trades as f64 / total_trades as f64 * 100.0,
            total_pnl / total_trades as f64,
        )
    } else {
        (0.0, 0.0)
    };

    let profit_factor = if gross_loss > 0.0 {
        Some(gross_profit / gross_loss)
    } else {
        None
    };

    TradeSummary {
        total_trades,
        winning_trades,
        losing_trades: total_trades - winning_trades,
        win_rate,
        total_pnl,
        average_pnl,
        gross_profit,
        gross_loss,
        profit_factor,
        best_trade: best.cloned(),
        worst_trade: worst.cloned(),
    }
}

pub fn group_by_date<'a, I>(trades: I) -> DailyGroups
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut groups = DailyGroups::new();
    for trade in trades {
        let group = groups.entry(trade.date).or_default();
        group.total_pnl += trade.pnl;
        group.trades.push(trade.clone());
    }
    groups
}
