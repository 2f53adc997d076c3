//! Firmware artifact records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::service::ArtifactError;

pub const EVENT_UPLOADED: &str = "firmware.uploaded";
pub const EVENT_DELETED: &str = "firmware.deleted";

const MAX_IDENTIFIER_LEN: usize = 128;

/// One stored firmware binary, keyed by `(artifact_type, version)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub artifact_type: String,
    pub version: String,
    pub filename: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the stored binary
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Artifact as exposed over HTTP and in webhook payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub version: String,
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl ArtifactRecord {
    pub fn to_view(&self, download_url: Option<String>) -> ArtifactView {
        ArtifactView {
            artifact_type: self.artifact_type.clone(),
            version: self.version.clone(),
            filename: self.filename.clone(),
            size_bytes: self.size_bytes,
            sha256: self.sha256.clone(),
            created_at: self.created_at,
            download_url,
        }
    }
}

/// Check that a type or version can be used as a single path segment.
///
/// Allowed: ASCII alphanumerics, `.`, `_` and `-`, at most 128 bytes, and
/// never `.` or `..` on their own.
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), ArtifactError> {
    if value.is_empty() {
        return Err(ArtifactError::Validation(format!("{} must not be empty", kind)));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ArtifactError::Validation(format!(
            "{} exceeds {} bytes",
            kind, MAX_IDENTIFIER_LEN
        )));
    }
    if value == "." || value == ".." {
        return Err(ArtifactError::Validation(format!("{} must not be a relative path", kind)));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ArtifactError::Validation(format!(
            "{} contains invalid character {:?}",
            kind, c
        )));
    }
    Ok(())
}
