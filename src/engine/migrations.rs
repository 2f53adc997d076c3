//! Firmware Registry Migrations Module
//! Applies the embedded schema migrations and journals them with checksums

use crate::engine::database::{record_migration, Database, DatabaseError};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

const EMBEDDED_MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_create_firmware.sql",
        include_str!("../../migrations/0001_create_firmware.sql"),
    ),
    (
        "0002_create_webhooks.sql",
        include_str!("../../migrations/0002_create_webhooks.sql"),
    ),
];

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Schema drift detected: {0}")]
    SchemaDrift(String),
    #[error("SQL execution error: {0}")]
    SqlError(#[from] rusqlite::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub name: String,
    pub sql: String,
    pub checksum: String,
}

impl Migration {
    pub fn new(name: &str, sql: &str) -> Self {
        Self {
            name: name.to_string(),
            sql: sql.to_string(),
            checksum: compute_checksum(sql),
        }
    }
}

pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    /// Runner over the migrations compiled into the binary.
    pub fn embedded() -> Self {
        Self::new(
            EMBEDDED_MIGRATIONS
                .iter()
                .map(|(name, sql)| Migration::new(name, sql))
                .collect(),
        )
    }

    pub fn new(mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        Self { migrations }
    }

    /// Migrations not yet applied, in order.
    ///
    /// Fails with `SchemaDrift` if an applied migration's SQL has changed
    /// since it was journaled.
    pub fn list_pending(&self, db: &Database) -> Result<Vec<&Migration>, MigrationError> {
        let applied = db.get_applied_migrations()?;
        let mut pending = Vec::new();

        for migration in &self.migrations {
            match applied.iter().find(|(name, _)| *name == migration.name) {
                Some((_, checksum)) if *checksum != migration.checksum => {
                    return Err(MigrationError::SchemaDrift(format!(
                        "{} was modified after being applied",
                        migration.name
                    )));
                }
                Some(_) => {}
                None => pending.push(migration),
            }
        }

        Ok(pending)
    }

    pub fn apply(&self, db: &Database, migration: &Migration) -> Result<(), MigrationError> {
        let mut conn = db.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql)?;
        record_migration(&tx, &migration.name, &migration.checksum)?;
        tx.commit()?;
        info!(migration = %migration.name, "applied migration");
        Ok(())
    }

    /// Apply every pending migration. Safe to call on every boot.
    pub fn push(&self, db: &Database) -> Result<Vec<String>, MigrationError> {
        let pending = self.list_pending(db)?;
        let mut applied = Vec::new();

        for migration in pending {
            self.apply(db, migration)?;
            applied.push(migration.name.clone());
        }

        Ok(applied)
    }

    pub fn check(&self, db: &Database) -> Result<MigrationStatus, MigrationError> {
        let applied = db.get_applied_migrations()?;
        let pending = self.list_pending(db)?;

        Ok(MigrationStatus {
            applied_count: applied.len(),
            pending_count: pending.len(),
            pending_migrations: pending.iter().map(|m| m.name.clone()).collect(),
        })
    }
}

fn compute_checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub applied_count: usize,
    pub pending_count: usize,
    pub pending_migrations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let runner = MigrationRunner::embedded();

        let applied = runner.push(&db).unwrap();
        assert_eq!(
            applied,
            vec!["0001_create_firmware.sql", "0002_create_webhooks.sql"]
        );
        assert!(runner.push(&db).unwrap().is_empty());

        let status = runner.check(&db).unwrap();
        assert_eq!(status.applied_count, 2);
        assert_eq!(status.pending_count, 0);
        assert_eq!(db.get_tables().unwrap(), vec!["firmware", "webhooks"]);
    }

    #[test]
    fn test_modified_migration_is_drift() {
        let db = Database::in_memory().unwrap();
        MigrationRunner::new(vec![Migration::new("0001_t.sql", "CREATE TABLE t (id INTEGER);")])
            .push(&db)
            .unwrap();

        let changed = MigrationRunner::new(vec![Migration::new(
            "0001_t.sql",
            "CREATE TABLE t (id INTEGER, name TEXT);",
        )]);
        let result = changed.push(&db);
        assert!(matches!(result, Err(MigrationError::SchemaDrift(_))));
    }

    #[test]
    fn test_failed_migration_is_not_journaled() {
        let db = Database::in_memory().unwrap();
        let runner = MigrationRunner::new(vec![Migration::new("0001_bad.sql", "CREATE TABLE (;")]);

        assert!(matches!(runner.push(&db), Err(MigrationError::SqlError(_))));
        assert!(db.get_applied_migrations().unwrap().is_empty());
    }
}
