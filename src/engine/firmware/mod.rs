//! Firmware Artifacts
//!
//! Components:
//! - `model` - Artifact records and their wire representation
//! - `storage` - Filesystem blob store with atomic writes
//! - `repository` - Metadata persistence (SQLite and in-memory)
//! - `service` - Ingestion, lookup and removal

pub mod model;
pub mod storage;
pub mod repository;
pub mod service;

pub use model::{validate_identifier, ArtifactRecord, ArtifactView, EVENT_DELETED, EVENT_UPLOADED};
pub use repository::{ArtifactRepository, InMemoryArtifactRepository, SqliteArtifactRepository};
pub use service::{ArtifactError, ArtifactService, EventSink, NoopSink};
pub use storage::{BlobError, BlobStore};
