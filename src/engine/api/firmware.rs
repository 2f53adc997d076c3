//! Firmware routes

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use std::io::Cursor;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

use super::access::{AdminAccess, DeviceAccess};
use super::error::ApiError;
use super::ApiState;
use crate::engine::firmware::{validate_identifier, ArtifactView};

pub const SHA256_HEADER: &str = "x-firmware-sha256";
pub const VERSION_HEADER: &str = "x-firmware-version";

const DEFAULT_FILENAME: &str = "firmware.bin";

/// Multipart upload body, documentation only
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(content_media_type = "application/octet-stream")]
    file: Vec<u8>,
}

fn validate_key(artifact_type: &str, version: &str) -> Result<(), ApiError> {
    validate_identifier("type", artifact_type)?;
    validate_identifier("version", version)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/firmware/{type}",
    params(("type" = String, Path, description = "Firmware type")),
    responses(
        (status = 200, description = "Versions, newest first", body = Vec<ArtifactView>),
        (status = 401, description = "Device key or role required")
    ),
    tag = "firmware"
)]
pub async fn list_firmware(
    _: DeviceAccess,
    State(state): State<ApiState>,
    Path(artifact_type): Path<String>,
) -> Result<Json<Vec<ArtifactView>>, ApiError> {
    validate_identifier("type", &artifact_type)?;
    let records = state.artifacts.list(&artifact_type)?;
    Ok(Json(records.iter().map(|r| state.artifacts.view(r)).collect()))
}

#[utoipa::path(
    get,
    path = "/api/firmware/{type}/latest",
    params(("type" = String, Path, description = "Firmware type")),
    responses(
        (status = 200, description = "Newest version", body = ArtifactView),
        (status = 404, description = "No firmware for this type")
    ),
    tag = "firmware"
)]
pub async fn latest_firmware(
    _: DeviceAccess,
    State(state): State<ApiState>,
    Path(artifact_type): Path<String>,
) -> Result<Json<ArtifactView>, ApiError> {
    validate_identifier("type", &artifact_type)?;
    let record = state.artifacts.latest(&artifact_type)?;
    Ok(Json(state.artifacts.view(&record)))
}

#[utoipa::path(
    get,
    path = "/api/firmware/{type}/{version}",
    params(
        ("type" = String, Path, description = "Firmware type"),
        ("version" = String, Path, description = "Firmware version"),
    ),
    responses(
        (status = 200, description = "Firmware binary stream"),
        (status = 404, description = "Unknown version or missing binary")
    ),
    tag = "firmware"
)]
pub async fn download_firmware(
    _: DeviceAccess,
    State(state): State<ApiState>,
    Path((artifact_type, version)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    validate_key(&artifact_type, &version)?;
    let (record, file) = state.artifacts.open_blob(&artifact_type, &version)?;
    let stream = ReaderStream::new(tokio::fs::File::from_std(file));

    let headers = [
        (CONTENT_TYPE, "application/octet-stream".to_string()),
        (CONTENT_LENGTH, record.size_bytes.to_string()),
        (HeaderName::from_static(SHA256_HEADER), record.sha256),
        (HeaderName::from_static(VERSION_HEADER), record.version),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/firmware/{type}/{version}",
    params(
        ("type" = String, Path, description = "Firmware type"),
        ("version" = String, Path, description = "Firmware version"),
    ),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored artifact", body = ArtifactView),
        (status = 400, description = "Invalid identifier or missing file field"),
        (status = 413, description = "Upload exceeds the size limit")
    ),
    tag = "firmware"
)]
pub async fn upload_firmware(
    _: AdminAccess,
    State(state): State<ApiState>,
    Path((artifact_type, version)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<ArtifactView>, ApiError> {
    validate_key(&artifact_type, &version)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let data = field.bytes().await?;
        upload = Some((filename, data));
        break;
    }
    let (filename, data) = upload.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;

    let service = state.artifacts.clone();
    let record = tokio::task::spawn_blocking(move || {
        service.ingest(&artifact_type, &version, &filename, Cursor::new(data))
    })
    .await??;

    Ok(Json(state.artifacts.view(&record)))
}

#[utoipa::path(
    delete,
    path = "/api/firmware/{type}/{version}",
    params(
        ("type" = String, Path, description = "Firmware type"),
        ("version" = String, Path, description = "Firmware version"),
    ),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Unknown version")
    ),
    tag = "firmware"
)]
pub async fn delete_firmware(
    _: AdminAccess,
    State(state): State<ApiState>,
    Path((artifact_type, version)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    validate_key(&artifact_type, &version)?;

    let service = state.artifacts.clone();
    tokio::task::spawn_blocking(move || service.remove(&artifact_type, &version)).await??;

    Ok(Json(json!({ "deleted": true })))
}
