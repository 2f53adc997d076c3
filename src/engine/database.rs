//! Firmware Registry Database Module
//! SQLite adapter with connection pooling

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5000;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool: {0}")]
    PoolError(#[from] r2d2::Error),
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors shared by the metadata and subscription repositories.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Repository lock poisoned")]
    Poisoned,
}

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(&format!(
                "PRAGMA busy_timeout={}; PRAGMA foreign_keys=ON;",
                BUSY_TIMEOUT_MS
            ))
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        // Every in-memory connection is its own database, so the pool holds one
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.pool.get()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _fwregistry_migrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL,
                checksum TEXT NOT NULL
            )",
            [],
        )?;

        // PRAGMA journal_mode returns the resulting mode as a row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Ok(())
    }

    pub fn get_connection(&self) -> Result<DbConnection, DatabaseError> {
        Ok(self.pool.get()?)
    }

    /// Applied migrations as `(name, checksum)` in application order.
    pub fn get_applied_migrations(&self) -> Result<Vec<(String, String)>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name, checksum FROM _fwregistry_migrations ORDER BY id")?;
        let migrations = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        Ok(migrations)
    }

    pub fn get_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE '\\_fwregistry\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tables)
    }
}

/// Record a migration inside the caller's transaction.
pub(crate) fn record_migration(
    conn: &rusqlite::Connection,
    name: &str,
    checksum: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO _fwregistry_migrations (name, applied_at, checksum) VALUES (?1, datetime('now'), ?2)",
        params![name, checksum],
    )?;
    Ok(())
}
