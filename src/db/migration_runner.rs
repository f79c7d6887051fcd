use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use crate::error::{LedgerError, Result};

const BACKUPS_KEPT: usize = 5;

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub fn new(version: u32, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: vec![
                Migration::new(0, "bootstrap", include_str!("migrations/000_bootstrap.sql")),
                Migration::new(1, "initial_schema", include_str!("migrations/001_initial_schema.sql")),
                Migration::new(
                    2,
                    "add_trade_date_index",
                    include_str!("migrations/002_add_trade_date_index.sql"),
                ),
            ],
        }
    }

    /// Apply every migration newer than the recorded version.
    ///
    /// `db_path` is `None` for in-memory databases, which are not backed up.
    pub fn run_pending_migrations(&self, conn: &Connection, db_path: Option<&Path>) -> Result<usize> {
        if !self.has_schema_migrations_table(conn)? {
            log::info!("No schema_migrations table, bootstrapping");
            self.apply_migration(conn, &self.migrations[0])?;
        }

        let current_version = self.get_current_version(conn)?.unwrap_or(0);
        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > current_version)
            .collect();

        let Some(target) = pending.last() else {
            return Ok(0);
        };

        log::info!(
            "Found {} pending migrations (v{} -> v{})",
            pending.len(),
            current_version,
            target.version
        );

        // A freshly created file has nothing worth backing up
        if let Some(path) = db_path.filter(|_| current_version > 0) {
            let backup = self.create_backup(conn, path, target.version)?;
            log::info!("Backup created: {}", backup.display());
        }

        for migration in &pending {
            if let Err(e) = self.apply_migration(conn, migration) {
                log::error!("Migration {} ({}) failed: {}", migration.version, migration.name, e);
                return Err(e);
            }
        }

        Ok(pending.len())
    }

    fn apply_migration(&self, conn: &Connection, migration: &Migration) -> Result<()> {
        let start = Instant::now();
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms)
             VALUES (?, ?, ?, ?, ?)",
            params![
                migration.version,
                migration.name,
                chrono::Utc::now().timestamp(),
                migration.checksum(),
                start.elapsed().as_millis() as i64
            ],
        )?;
        tx.commit()?;

        log::info!("Applied migration {}: {}", migration.version, migration.name);
        Ok(())
    }

    /// Fail if an applied migration's SQL no longer matches what was recorded.
    pub fn verify_migrations(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT version, name, checksum FROM schema_migrations WHERE checksum IS NOT NULL ORDER BY version",
        )?;
        let applied = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (version, name, stored) in applied {
            if let Some(migration) = self.migrations.iter().find(|m| m.version == version) {
                if migration.checksum() != stored {
                    log::error!("Checksum mismatch for migration {} ({})", version, name);
                    return Err(LedgerError::Persistence(format!(
                        "migration {} ({}) was modified after it was applied",
                        version, name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        if !self.has_schema_migrations_table(conn)? {
            return Ok(None);
        }

        let version = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get::<_, Option<u32>>(0)
            })
            .optional()?
            .flatten();
        Ok(version)
    }

    fn has_schema_migrations_table(&self, conn: &Connection) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_backup(&self, conn: &Connection, db_path: &Path, target_version: u32) -> Result<PathBuf> {
        let backup_dir = db_path
            .parent()
            .map(|dir| dir.join("backups"))
            .ok_or_else(|| LedgerError::Persistence(format!("no parent directory for {}", db_path.display())))?;
        fs::create_dir_all(&backup_dir)?;

        let backup_path = backup_dir.join(format!(
            "pre_migration_v{}_{}.db",
            target_version,
            chrono::Utc::now().timestamp_millis()
        ));

        {
            let mut dst = Connection::open(&backup_path)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut dst)?;
            backup.run_to_completion(5, std::time::Duration::from_millis(250), None)?;
        }

        let integrity: String = Connection::open(&backup_path)?
            .pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if integrity != "ok" {
            return Err(LedgerError::Persistence(format!("backup integrity check failed: {}", integrity)));
        }

        self.cleanup_old_backups(&backup_dir)?;
        Ok(backup_path)
    }

    fn cleanup_old_backups(&self, backup_dir: &Path) -> Result<()> {
        let mut backups: Vec<_> = fs::read_dir(backup_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("pre_migration_") && name.ends_with(".db"))
            })
            .collect();

        backups.sort_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        });

        if backups.len() > BACKUPS_KEPT {
            for entry in &backups[..backups.len() - BACKUPS_KEPT] {
                if let Err(e) = fs::remove_file(entry.path()) {
                    log::warn!("Failed to delete old backup {}: {}", entry.path().display(), e);
                }
            }
        }

        Ok(())
    }
}
