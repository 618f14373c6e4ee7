//! Basic unauthenticated API routes

use axum::extract::Json;
use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;

use crate::utils::AppState;

/// Identify this API
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "The API name and version")),
)]
async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "aclforge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Report whether the API is up
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "The API is up")),
)]
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(paths(index, health))]
pub struct BasicDocs;

/// Add the basic routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/", get(index))
        .route("/api/v1/health", get(health))
}
