use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::db::migration_runner::MigrationRunner;
use crate::error::{LedgerError, Result};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(db_path)?;
        // WAL lets readers continue while a snapshot is being written
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::migrate(conn, Some(db_path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::migrate(Connection::open_in_memory()?, None)
    }

    fn migrate(conn: Connection, db_path: Option<&Path>) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let runner = MigrationRunner::new();
        let applied = runner.run_pending_migrations(&conn, db_path)?;
        if applied > 0 {
            log::info!("Applied {} migrations", applied);
        } else {
            log::debug!("Database schema is up to date");
        }

        runner.verify_migrations(&conn)?;

        if let Some(version) = runner.get_current_version(&conn)? {
            log::info!("Database schema version: {}", version);
        }

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| LedgerError::Persistence(e.to_string()))
    }
}
