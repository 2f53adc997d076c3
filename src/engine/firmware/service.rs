//! Firmware Artifact Service
//!
//! Orchestrates ingestion (hash, store, persist metadata) and retrieval
//! (lookup, latest-by-version). Change events go out through an [`EventSink`]
//! after the metadata write has committed.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::model::{ArtifactRecord, ArtifactView, EVENT_DELETED, EVENT_UPLOADED};
use super::repository::ArtifactRepository;
use super::storage::{BlobError, BlobStore};
use crate::engine::database::RepositoryError;
use crate::engine::version::sort_newest_first;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Receives artifact change events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &str, artifact: &ArtifactView);
}

/// Sink that drops every event
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: &str, _artifact: &ArtifactView) {}
}

pub struct ArtifactService {
    repo: Arc<dyn ArtifactRepository>,
    storage: BlobStore,
    public_base: Option<String>,
    events: Arc<dyn EventSink>,
}

impl ArtifactService {
    pub fn new(repo: Arc<dyn ArtifactRepository>, storage: BlobStore) -> Self {
        Self {
            repo,
            storage,
            public_base: None,
            events: Arc::new(NoopSink),
        }
    }

    /// Base URL used to build download locators. Blank disables locators.
    pub fn with_public_base(mut self, base: Option<&str>) -> Self {
        self.public_base = base
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn storage(&self) -> &BlobStore {
        &self.storage
    }

    /// Read the payload, hash it, store it atomically, then upsert metadata.
    ///
    /// A failed blob write never reaches the repository, so the previous
    /// record (if any) stays authoritative. A failed upsert after a good write
    /// leaves the new blob on disk behind the old record.
    pub fn ingest<R: Read>(
        &self,
        artifact_type: &str,
        version: &str,
        filename: &str,
        mut reader: R,
    ) -> Result<ArtifactRecord, ArtifactError> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| ArtifactError::Storage(format!("failed to read upload: {}", e)))?;

        let sha256 = hex::encode(Sha256::digest(&data));

        self.storage
            .write(artifact_type, version, &data)
            .map_err(|e| ArtifactError::Storage(format!("failed to write blob: {}", e)))?;

        let record = ArtifactRecord {
            artifact_type: artifact_type.to_string(),
            version: version.to_string(),
            filename: filename.to_string(),
            size_bytes: data.len() as u64,
            sha256,
            created_at: Utc::now(),
        };

        self.repo
            .upsert(&record)
            .map_err(|e| ArtifactError::Storage(format!("failed to persist metadata: {}", e)))?;

        info!(
            r#type = %record.artifact_type,
            version = %record.version,
            size = record.size_bytes,
            sha256 = %record.sha256,
            "firmware stored"
        );
        self.events.publish(EVENT_UPLOADED, &self.view(&record));

        Ok(record)
    }

    pub fn resolve(&self, artifact_type: &str, version: &str) -> Result<ArtifactRecord, ArtifactError> {
        self.repo
            .get(artifact_type, version)
            .map_err(|e| lookup_error(artifact_type, version, e))
    }

    /// All versions of a type, newest first.
    pub fn list(&self, artifact_type: &str) -> Result<Vec<ArtifactRecord>, ArtifactError> {
        let mut records = self
            .repo
            .list(artifact_type)
            .map_err(|e| ArtifactError::Storage(e.to_string()))?;
        sort_newest_first(&mut records, |r| r.version.as_str());
        Ok(records)
    }

    pub fn latest(&self, artifact_type: &str) -> Result<ArtifactRecord, ArtifactError> {
        self.list(artifact_type)?
            .into_iter()
            .next()
            .ok_or_else(|| ArtifactError::NotFound(format!("no firmware for type {}", artifact_type)))
    }

    /// Delete the blob directory, then the record.
    ///
    /// Nothing is touched if the record does not exist. The two deletions are
    /// independent: a blob failure does not stop the record deletion, but it
    /// is still reported.
    pub fn remove(&self, artifact_type: &str, version: &str) -> Result<ArtifactRecord, ArtifactError> {
        let record = self.resolve(artifact_type, version)?;

        let blob_result = self.storage.remove(artifact_type, version);
        if let Err(e) = &blob_result {
            warn!(r#type = artifact_type, version, error = %e, "failed to remove firmware blob");
        }

        self.repo.delete(artifact_type, version).map_err(|e| match e {
            RepositoryError::NotFound(key) => ArtifactError::NotFound(key),
            other => ArtifactError::Storage(format!("failed to delete metadata: {}", other)),
        })?;

        blob_result.map_err(|e| ArtifactError::Storage(format!("failed to remove blob: {}", e)))?;

        info!(r#type = artifact_type, version, "firmware removed");
        self.events.publish(EVENT_DELETED, &self.view(&record));

        Ok(record)
    }

    pub fn download_path(&self, artifact_type: &str, version: &str) -> PathBuf {
        self.storage.path(artifact_type, version)
    }

    /// Caller-facing locator, if a public base URL is configured.
    pub fn download_url(&self, artifact_type: &str, version: &str) -> Option<String> {
        self.public_base
            .as_ref()
            .map(|base| format!("{}/api/firmware/{}/{}", base, artifact_type, version))
    }

    pub fn view(&self, record: &ArtifactRecord) -> ArtifactView {
        record.to_view(self.download_url(&record.artifact_type, &record.version))
    }

    /// Resolve metadata, then open the stored binary for streaming.
    pub fn open_blob(&self, artifact_type: &str, version: &str) -> Result<(ArtifactRecord, File), ArtifactError> {
        let record = self.resolve(artifact_type, version)?;
        let file = self.storage.open(artifact_type, version).map_err(|e| match e {
            BlobError::NotFound(_) => {
                ArtifactError::NotFound(format!("missing binary for {}/{}", artifact_type, version))
            }
            BlobError::Io(e) => ArtifactError::Storage(e.to_string()),
        })?;
        Ok((record, file))
    }
}

fn lookup_error(artifact_type: &str, version: &str, err: RepositoryError) -> ArtifactError {
    match err {
        RepositoryError::NotFound(_) => {
            ArtifactError::NotFound(format!("firmware {}/{}", artifact_type, version))
        }
        other => ArtifactError::Storage(other.to_string()),
    }
}
