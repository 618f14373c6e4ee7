//! API routes for interacting with deployments
//!
//! Deployments are created by deploying revisions so these routes are read
//! only; workers record their status and captured logs as they run.

use axum::extract::{Json, Path, Query, State};
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{Deployment, ListParams, Page, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Lists deployments
///
/// # Arguments
///
/// * `user` - The user that is listing deployments
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/deployments",
    params(ListParams),
    responses((status = 200, description = "Deployment list", body = Page<Deployment>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployments::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Deployment>>, ApiError> {
    require_scopes!(user, "deployments:read");
    let page = Deployment::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single deployment
///
/// # Arguments
///
/// * `user` - The user that is getting this deployment
/// * `state` - Shared aclforge objects
/// * `id` - The deployment id
#[utoipa::path(
    get,
    path = "/api/v1/deployments/{id}",
    params(("id" = i64, Path, description = "The deployment id")),
    responses(
        (status = 200, description = "Deployment details", body = Deployment),
        (status = 404, description = "Deployment not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployments::get_deployment", skip_all, err(Debug))]
async fn get_deployment(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Deployment>, ApiError> {
    require_scopes!(user, "deployments:read");
    let deployment = Deployment::get(id, &state.shared).await?;
    Ok(Json(deployment))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(list, get_deployment),
    components(schemas(Deployment, Page<Deployment>)),
)]
pub struct DeploymentDocs;

/// Add the deployment routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/deployments", get(list))
        .route("/api/v1/deployments/{id}", get(get_deployment))
}
