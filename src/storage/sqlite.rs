use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection};

use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::ledger::generate_trade_id;
use crate::ledger::validation::DATE_FORMAT;
use crate::models::{Trade, TradeDocument, TradeType};
use crate::storage::{RemoteTradeStore, SnapshotStore};

const SELECT_TRADE: &str = "SELECT id, symbol, trade_type, entry_price, exit_price, quantity, \
                            trade_date, notes, pnl, pnl_percentage FROM trades";

impl ToSql for TradeType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TradeType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: LedgerError| FromSqlError::Other(Box::new(e)))
    }
}

fn map_row_to_trade(row: &rusqlite::Row) -> rusqlite::Result<Trade> {
    let raw_date: String = row.get(6)?;
    let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Trade {
        id: row.get(0)?,
        symbol: row.get(1)?,
        trade_type: row.get(2)?,
        entry_price: row.get(3)?,
        exit_price: row.get(4)?,
        quantity: row.get(5)?,
        date,
        notes: row.get(7)?,
        pnl: row.get(8)?,
        pnl_percentage: row.get(9)?,
    })
}

fn insert_trade(
    conn: &Connection,
    id: &str,
    owner_id: &str,
    position: i64,
    trade: &TradeDocument,
) -> rusqlite::Result<usize> {
    let now = Utc::now().timestamp();
    conn.execute(
        "INSERT INTO trades (
            id, owner_id, position, symbol, trade_type, entry_price, exit_price, quantity,
            trade_date, notes, pnl, pnl_percentage, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            owner_id,
            position,
            trade.symbol,
            trade.trade_type,
            trade.entry_price,
            trade.exit_price,
            trade.quantity,
            trade.date.format(DATE_FORMAT).to_string(),
            trade.notes,
            trade.pnl,
            trade.pnl_percentage,
            now,
            now
        ],
    )
}

/// SQLite-backed trade storage.
///
/// As a `SnapshotStore` it reads and replaces the rows of one owner; as a
/// `RemoteTradeStore` it acts as a shared document collection keyed by id.
pub struct SqliteStore {
    db: Database,
    owner_id: String,
}

impl SqliteStore {
    pub fn new(db: Database, owner_id: impl Into<String>) -> Self {
        Self {
            db,
            owner_id: owner_id.into(),
        }
    }

    pub fn open(path: &Path, owner_id: impl Into<String>) -> Result<Self> {
        log::info!("Opening trade database at {}", path.display());
        Ok(Self::new(Database::open(path)?, owner_id))
    }

    pub fn open_in_memory(owner_id: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, owner_id))
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn list(&self, owner_id: &str) -> Result<Vec<Trade>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE owner_id = ? ORDER BY position ASC", SELECT_TRADE))?;
        let trades = stmt
            .query_map([owner_id], map_row_to_trade)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trades)
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self) -> Result<Vec<Trade>> {
        self.list(&self.owner_id)
    }

    fn save(&self, trades: &[Trade]) -> Result<()> {
        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM trades WHERE owner_id = ?", [&self.owner_id])?;
        for (position, trade) in trades.iter().enumerate() {
            insert_trade(&tx, &trade.id, &self.owner_id, position as i64, &trade.to_document())?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl RemoteTradeStore for SqliteStore {
    async fn create(&self, owner_id: &str, trade: &TradeDocument) -> Result<String> {
        let conn = self.db.conn()?;
        let id = generate_trade_id();

        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM trades WHERE owner_id = ?",
            [owner_id],
            |row| row.get(0),
        )?;
        insert_trade(&conn, &id, owner_id, position, trade)?;

        Ok(id)
    }

    async fn update(&self, id: &str, trade: &TradeDocument) -> Result<()> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE trades SET symbol = ?, trade_type = ?, entry_price = ?, exit_price = ?,
                quantity = ?, trade_date = ?, notes = ?, pnl = ?, pnl_percentage = ?, updated_at = ?
             WHERE id = ?",
            params![
                trade.symbol,
                trade.trade_type,
                trade.entry_price,
                trade.exit_price,
                trade.quantity,
                trade.date.format(DATE_FORMAT).to_string(),
                trade.notes,
                trade.pnl,
                trade.pnl_percentage,
                Utc::now().timestamp(),
                id
            ],
        )?;

        if changed == 0 {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute("DELETE FROM trades WHERE id = ?", [id])?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Trade>> {
        self.list(owner_id)
    }
}
