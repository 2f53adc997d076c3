//! Firmware Registry HTTP API
//! REST routes for firmware and webhook administration, with OpenAPI documentation

pub mod access;
pub mod error;
pub mod firmware;
pub mod webhooks;

use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::engine::auth::Authenticator;
use crate::engine::firmware::{ArtifactService, ArtifactView};
use crate::engine::webhook::{SubscriptionRepository, SubscriptionRequest, SubscriptionView};

pub use error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub artifacts: Arc<ArtifactService>,
    pub webhooks: Arc<dyn SubscriptionRepository>,
    pub auth: Arc<dyn Authenticator>,
    pub max_upload_bytes: usize,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        firmware::list_firmware,
        firmware::latest_firmware,
        firmware::download_firmware,
        firmware::upload_firmware,
        firmware::delete_firmware,
        webhooks::list_webhooks,
        webhooks::create_webhook,
        webhooks::update_webhook,
        webhooks::delete_webhook,
    ),
    components(schemas(ArtifactView, SubscriptionView, SubscriptionRequest, HealthResponse, firmware::UploadForm)),
    tags(
        (name = "firmware", description = "Firmware storage and retrieval"),
        (name = "webhooks", description = "Webhook subscriptions"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/firmware/{type}", get(firmware::list_firmware))
        .route("/api/firmware/{type}/latest", get(firmware::latest_firmware))
        .route(
            "/api/firmware/{type}/{version}",
            get(firmware::download_firmware)
                .post(firmware::upload_firmware)
                .delete(firmware::delete_firmware),
        )
        .route(
            "/api/webhooks",
            get(webhooks::list_webhooks).post(webhooks::create_webhook),
        )
        .route(
            "/api/webhooks/{id}",
            put(webhooks::update_webhook).delete(webhooks::delete_webhook),
        )
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "firmware"
)]
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
