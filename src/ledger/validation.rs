use chrono::NaiveDate;

use crate::error::{LedgerError, Result};
use crate::models::{NewTrade, TradeInput};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

impl TradeInput {
    /// Coerce raw form strings into a validated `NewTrade`.
    pub fn parse(&self) -> Result<NewTrade> {
        let symbol = self.symbol.clone();
        let trade_type = self.trade_type.parse()?;
        let entry_price = parse_number("entry_price", &self.entry_price)?;
        let exit_price = parse_number("exit_price", &self.exit_price)?;
        let quantity = parse_number("quantity", &self.quantity)?;
        let date = parse_date(&self.date)?;

        NewTrade {
            symbol,
            trade_type,
            entry_price,
            exit_price,
            quantity,
            date,
            notes: self.notes.clone(),
        }
        .validate()
    }
}

impl NewTrade {
    /// Check every field and normalize symbol and notes.
    pub fn validate(self) -> Result<NewTrade> {
        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(LedgerError::validation("symbol", "must not be empty"));
        }

        check_positive("entry_price", self.entry_price)?;
        check_positive("exit_price", self.exit_price)?;
        check_positive("quantity", self.quantity)?;

        Ok(NewTrade {
            symbol: symbol.to_string(),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            ..self
        })
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LedgerError::validation(field, "is required"));
    }

    let value = raw
        .parse::<f64>()
        .map_err(|_| LedgerError::validation(field, format!("'{}' is not a number", raw)))?;

    check_positive(field, value)?;
    Ok(value)
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(LedgerError::validation(field, "must be a finite number"));
    }
    if value <= 0.0 {
        return Err(LedgerError::validation(
            field,
            format!("must be greater than zero, got {}", value),
        ));
    }
    Ok(())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        LedgerError::validation("date", format!("'{}' is not a YYYY-MM-DD date", raw))
    })
}
