//! HTTP error mapping

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::engine::auth::Role;
use crate::engine::database::RepositoryError;
use crate::engine::firmware::ArtifactError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(Role),
    PayloadTooLarge(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthorized(role) => format!("unauthorized ({})", role),
            ApiError::NotFound(m)
            | ApiError::BadRequest(m)
            | ApiError::PayloadTooLarge(m)
            | ApiError::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<ArtifactError> for ApiError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(m) => ApiError::NotFound(m),
            ArtifactError::Validation(m) => ApiError::BadRequest(m),
            ArtifactError::Storage(m) => ApiError::Internal(m),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(m) => ApiError::NotFound(format!("{} not found", m)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("invalid multipart: {}", err.body_text()))
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_error_mapping() {
        let cases = [
            (ArtifactError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ArtifactError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ArtifactError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_unauthorized_message_names_role() {
        assert_eq!(ApiError::Unauthorized(Role::Admin).message(), "unauthorized (admin)");
        assert_eq!(ApiError::Unauthorized(Role::Device).message(), "unauthorized (device)");
    }
}
