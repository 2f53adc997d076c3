//! Webhook subscription routes (admin only)

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::{json, Value};

use super::access::AdminAccess;
use super::error::ApiError;
use super::ApiState;
use crate::engine::webhook::{SubscriptionRequest, SubscriptionView};

fn check_id(id: i64) -> Result<i64, ApiError> {
    if id <= 0 {
        return Err(ApiError::BadRequest("invalid id".to_string()));
    }
    Ok(id)
}

#[utoipa::path(
    get,
    path = "/api/webhooks",
    responses((status = 200, description = "All subscriptions", body = Vec<SubscriptionView>)),
    tag = "webhooks"
)]
pub async fn list_webhooks(
    _: AdminAccess,
    State(state): State<ApiState>,
) -> Result<Json<Vec<SubscriptionView>>, ApiError> {
    let subscriptions = state.webhooks.list()?;
    Ok(Json(subscriptions.iter().map(|s| s.to_view()).collect()))
}

#[utoipa::path(
    post,
    path = "/api/webhooks",
    request_body = SubscriptionRequest,
    responses(
        (status = 200, description = "Created, returns the new id"),
        (status = 400, description = "Missing url or events")
    ),
    tag = "webhooks"
)]
pub async fn create_webhook(
    _: AdminAccess,
    State(state): State<ApiState>,
    Json(request): Json<SubscriptionRequest>,
) -> Result<Json<Value>, ApiError> {
    let subscription = request.into_new().map_err(ApiError::BadRequest)?;
    let id = state.webhooks.create(&subscription)?;
    Ok(Json(json!({ "id": id })))
}

#[utoipa::path(
    put,
    path = "/api/webhooks/{id}",
    params(("id" = i64, Path, description = "Subscription id")),
    request_body = SubscriptionRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Unknown subscription")
    ),
    tag = "webhooks"
)]
pub async fn update_webhook(
    _: AdminAccess,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<SubscriptionRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = check_id(id)?;
    let subscription = request.into_new().map_err(ApiError::BadRequest)?;
    state.webhooks.update(id, &subscription)?;
    Ok(Json(json!({ "updated": true })))
}

#[utoipa::path(
    delete,
    path = "/api/webhooks/{id}",
    params(("id" = i64, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Unknown subscription")
    ),
    tag = "webhooks"
)]
pub async fn delete_webhook(
    _: AdminAccess,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.webhooks.delete(check_id(id)?)?;
    Ok(Json(json!({ "deleted": true })))
}
