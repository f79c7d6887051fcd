use crate::models::{NewTrade, Trade, TradeType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pnl {
    pub amount: f64,
    pub percentage: f64,
}

/// Profit/loss of a closed position. `entry_price` must be positive.
pub fn compute_pnl(trade_type: TradeType, entry_price: f64, exit_price: f64, quantity: f64) -> Pnl {
    let per_unit = match trade_type {
        TradeType::Long => exit_price - entry_price,
        TradeType::Short => entry_price - exit_price,
    };

    Pnl {
        amount: per_unit * quantity,
        percentage: per_unit / entry_price * 100.0,
    }
}

/// Build the stored record from validated input.
pub(crate) fn derive_trade(id: String, trade: NewTrade) -> Trade {
    let pnl = compute_pnl(trade.trade_type, trade.entry_price, trade.exit_price, trade.quantity);

    Trade {
        id,
        symbol: trade.symbol,
        trade_type: trade.trade_type,
        entry_price: trade.entry_price,
        exit_price: trade.exit_price,
        quantity: trade.quantity,
        date: trade.date,
        notes: trade.notes,
        pnl: pnl.amount,
        pnl_percentage: pnl.percentage,
    }
}
