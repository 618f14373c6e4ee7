//! API routes for interacting with deployers

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{Deployer, DeployerRequest, ListParams, Page, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Creates a new deployer
///
/// # Arguments
///
/// * `user` - The user that is creating this deployer
/// * `state` - Shared aclforge objects
/// * `request` - The deployer request
#[utoipa::path(
    post,
    path = "/api/v1/deployers",
    responses(
        (status = 201, description = "Deployer created", body = Deployer),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployers::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<DeployerRequest>,
) -> Result<(StatusCode, Json<Deployer>), ApiError> {
    require_scopes!(user, "deployers:write");
    let deployer = Deployer::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(deployer)))
}

/// Lists deployers
///
/// # Arguments
///
/// * `user` - The user that is listing deployers
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/deployers",
    params(ListParams),
    responses((status = 200, description = "Deployer list", body = Page<Deployer>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployers::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Deployer>>, ApiError> {
    require_scopes!(user, "deployers:read");
    let page = Deployer::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single deployer
///
/// # Arguments
///
/// * `user` - The user that is getting this deployer
/// * `state` - Shared aclforge objects
/// * `id` - The deployer id
#[utoipa::path(
    get,
    path = "/api/v1/deployers/{id}",
    params(("id" = i64, Path, description = "The deployer id")),
    responses(
        (status = 200, description = "Deployer details", body = Deployer),
        (status = 404, description = "Deployer not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployers::get_deployer", skip_all, err(Debug))]
async fn get_deployer(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Deployer>, ApiError> {
    require_scopes!(user, "deployers:read");
    let deployer = Deployer::get(id, &state.shared).await?;
    Ok(Json(deployer))
}

/// Replace a deployer
///
/// # Arguments
///
/// * `user` - The user that is updating this deployer
/// * `state` - Shared aclforge objects
/// * `id` - The deployer id
/// * `request` - The deployer request to apply
#[utoipa::path(
    put,
    path = "/api/v1/deployers/{id}",
    params(("id" = i64, Path, description = "The deployer id")),
    responses(
        (status = 200, description = "Deployer updated", body = Deployer),
        (status = 404, description = "Deployer not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployers::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DeployerRequest>,
) -> Result<Json<Deployer>, ApiError> {
    require_scopes!(user, "deployers:write");
    let deployer = Deployer::update(id, request, &state.shared).await?;
    Ok(Json(deployer))
}

/// Delete a deployer
///
/// # Arguments
///
/// * `user` - The user that is deleting this deployer
/// * `state` - Shared aclforge objects
/// * `id` - The deployer id
#[utoipa::path(
    delete,
    path = "/api/v1/deployers/{id}",
    params(("id" = i64, Path, description = "The deployer id")),
    responses(
        (status = 204, description = "Deployer deleted"),
        (status = 404, description = "Deployer not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::deployers::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "deployers:write");
    Deployer::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_deployer, update, delete),
    components(schemas(Deployer, DeployerRequest, Page<Deployer>)),
)]
pub struct DeployerDocs;

/// Add the deployer routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/deployers", get(list).post(create))
        .route(
            "/api/v1/deployers/{id}",
            get(get_deployer).put(update).delete(delete),
        )
}
