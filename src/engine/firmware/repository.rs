//! Firmware metadata persistence

use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::model::ArtifactRecord;
use crate::engine::database::{Database, RepositoryError};

/// Durable store of artifact records, one per `(type, version)`.
///
/// Implementations serialize conflicting writes themselves.
pub trait ArtifactRepository: Send + Sync {
    /// Insert the record or replace the existing one for the same key.
    fn upsert(&self, record: &ArtifactRecord) -> Result<(), RepositoryError>;

    fn get(&self, artifact_type: &str, version: &str) -> Result<ArtifactRecord, RepositoryError>;

    /// All records of one type, in no particular order.
    fn list(&self, artifact_type: &str) -> Result<Vec<ArtifactRecord>, RepositoryError>;

    fn delete(&self, artifact_type: &str, version: &str) -> Result<(), RepositoryError>;
}

fn key_label(artifact_type: &str, version: &str) -> String {
    format!("{}/{}", artifact_type, version)
}

pub struct SqliteArtifactRepository {
    db: Database,
}

impl SqliteArtifactRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
        Ok(ArtifactRecord {
            artifact_type: row.get(0)?,
            version: row.get(1)?,
            filename: row.get(2)?,
            size_bytes: row.get(3)?,
            sha256: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl ArtifactRepository for SqliteArtifactRepository {
    fn upsert(&self, record: &ArtifactRecord) -> Result<(), RepositoryError> {
        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO firmware (type, version, filename, size_bytes, sha256, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(type, version) DO UPDATE SET
                filename = excluded.filename,
                size_bytes = excluded.size_bytes,
                sha256 = excluded.sha256,
                created_at = excluded.created_at",
            params![
                record.artifact_type,
                record.version,
                record.filename,
                record.size_bytes,
                record.sha256,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, artifact_type: &str, version: &str) -> Result<ArtifactRecord, RepositoryError> {
        let conn = self.db.get_connection()?;
        conn.query_row(
            "SELECT type, version, filename, size_bytes, sha256, created_at
             FROM firmware WHERE type = ?1 AND version = ?2",
            params![artifact_type, version],
            Self::row_to_record,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(key_label(artifact_type, version)))
    }

    fn list(&self, artifact_type: &str) -> Result<Vec<ArtifactRecord>, RepositoryError> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT type, version, filename, size_bytes, sha256, created_at
             FROM firmware WHERE type = ?1",
        )?;
        let records = stmt
            .query_map(params![artifact_type], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn delete(&self, artifact_type: &str, version: &str) -> Result<(), RepositoryError> {
        let conn = self.db.get_connection()?;
        let affected = conn.execute(
            "DELETE FROM firmware WHERE type = ?1 AND version = ?2",
            params![artifact_type, version],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound(key_label(artifact_type, version)));
        }
        Ok(())
    }
}

/// In-memory repository for tests and ephemeral setups
#[derive(Default)]
pub struct InMemoryArtifactRepository {
    records: RwLock<BTreeMap<(String, String), ArtifactRecord>>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactRepository for InMemoryArtifactRepository {
    fn upsert(&self, record: &ArtifactRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().map_err(|_| RepositoryError::Poisoned)?;
        records.insert(
            (record.artifact_type.clone(), record.version.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn get(&self, artifact_type: &str, version: &str) -> Result<ArtifactRecord, RepositoryError> {
        let records = self.records.read().map_err(|_| RepositoryError::Poisoned)?;
        records
            .get(&(artifact_type.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(key_label(artifact_type, version)))
    }

    fn list(&self, artifact_type: &str) -> Result<Vec<ArtifactRecord>, RepositoryError> {
        let records = self.records.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(records
            .values()
            .filter(|r| r.artifact_type == artifact_type)
            .cloned()
            .collect())
    }

    fn delete(&self, artifact_type: &str, version: &str) -> Result<(), RepositoryError> {
        let mut records = self.records.write().map_err(|_| RepositoryError::Poisoned)?;
        records
            .remove(&(artifact_type.to_string(), version.to_string()))
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(key_label(artifact_type, version)))
    }
}
