//! Role guards as request extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;
use super::ApiState;
use crate::engine::auth::Role;

/// Present in a handler's arguments when the caller may act as admin.
pub struct AdminAccess;

/// Present in a handler's arguments when the caller may act as a device.
pub struct DeviceAccess;

async fn require(state: &ApiState, parts: &Parts, role: Role) -> Result<(), ApiError> {
    if state.auth.authorize(&parts.headers, role).await {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(role))
    }
}

impl FromRequestParts<ApiState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        require(state, parts, Role::Admin).await.map(|_| AdminAccess)
    }
}

impl FromRequestParts<ApiState> for DeviceAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        require(state, parts, Role::Device).await.map(|_| DeviceAccess)
    }
}
