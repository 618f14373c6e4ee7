//! API routes for interacting with targets

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{ListParams, Page, Target, TargetRequest, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Creates a new target
///
/// # Arguments
///
/// * `user` - The user that is creating this target
/// * `state` - Shared aclforge objects
/// * `request` - The target request
#[utoipa::path(
    post,
    path = "/api/v1/targets",
    responses(
        (status = 201, description = "Target created", body = Target),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::targets::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<TargetRequest>,
) -> Result<(StatusCode, Json<Target>), ApiError> {
    require_scopes!(user, "targets:write");
    let target = Target::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(target)))
}

/// Lists targets
///
/// # Arguments
///
/// * `user` - The user that is listing targets
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/targets",
    params(ListParams),
    responses((status = 200, description = "Target list", body = Page<Target>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::targets::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Target>>, ApiError> {
    require_scopes!(user, "targets:read");
    let page = Target::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single target
///
/// # Arguments
///
/// * `user` - The user that is getting this target
/// * `state` - Shared aclforge objects
/// * `id` - The target id
#[utoipa::path(
    get,
    path = "/api/v1/targets/{id}",
    params(("id" = i64, Path, description = "The target id")),
    responses(
        (status = 200, description = "Target details", body = Target),
        (status = 404, description = "Target not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::targets::get_target", skip_all, err(Debug))]
async fn get_target(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Target>, ApiError> {
    require_scopes!(user, "targets:read");
    let target = Target::get(id, &state.shared).await?;
    Ok(Json(target))
}

/// Replace a target
///
/// # Arguments
///
/// * `user` - The user that is updating this target
/// * `state` - Shared aclforge objects
/// * `id` - The target id
/// * `request` - The target request to apply
#[utoipa::path(
    put,
    path = "/api/v1/targets/{id}",
    params(("id" = i64, Path, description = "The target id")),
    responses(
        (status = 200, description = "Target updated", body = Target),
        (status = 404, description = "Target not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::targets::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<Target>, ApiError> {
    require_scopes!(user, "targets:write");
    let target = Target::update(id, request, &state.shared).await?;
    Ok(Json(target))
}

/// Delete a target
///
/// # Arguments
///
/// * `user` - The user that is deleting this target
/// * `state` - Shared aclforge objects
/// * `id` - The target id
#[utoipa::path(
    delete,
    path = "/api/v1/targets/{id}",
    params(("id" = i64, Path, description = "The target id")),
    responses(
        (status = 204, description = "Target deleted"),
        (status = 404, description = "Target not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::targets::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "targets:write");
    Target::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_target, update, delete),
    components(schemas(Target, TargetRequest, Page<Target>)),
)]
pub struct TargetDocs;

/// Add the target routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/targets", get(list).post(create))
        .route(
            "/api/v1/targets/{id}",
            get(get_target).put(update).delete(delete),
        )
}
