use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Trade;
use crate::stats::group_by_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    pub date: NaiveDate,
    pub cumulative_pnl: f64,
    pub daily_pnl: f64,
    pub trade_count: usize,
}

/// Running P&L, one point per trading date in ascending order.
pub fn equity_curve<'a, I>(trades: I) -> Vec<EquityCurvePoint>
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut cumulative_pnl = 0.0;

    group_by_date(trades)
        .into_iter()
        .map(|(date, group)| {
            cumulative_pnl += group.total_pnl;
            EquityCurvePoint {
                date,
                cumulative_pnl,
                daily_pnl: group.total_pnl,
                trade_count: group.trade_count(),
            }
        })
        .collect()
}
