//! API routes for interacting with dynamic policies

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{DynamicPolicy, DynamicPolicyRequest, ListParams, Page, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Creates a new dynamic policy
///
/// # Arguments
///
/// * `user` - The user that is creating this dynamic policy
/// * `state` - Shared aclforge objects
/// * `request` - The dynamic policy request
#[utoipa::path(
    post,
    path = "/api/v1/dynamic_policies",
    responses(
        (status = 201, description = "Dynamic policy created", body = DynamicPolicy),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::dynamic_policies::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<DynamicPolicyRequest>,
) -> Result<(StatusCode, Json<DynamicPolicy>), ApiError> {
    require_scopes!(user, "dynamic_policies:write");
    let dynamic = DynamicPolicy::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(dynamic)))
}

/// Lists dynamic policies
///
/// # Arguments
///
/// * `user` - The user that is listing dynamic policies
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/dynamic_policies",
    params(ListParams),
    responses((status = 200, description = "Dynamic policy list", body = Page<DynamicPolicy>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::dynamic_policies::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<DynamicPolicy>>, ApiError> {
    require_scopes!(user, "dynamic_policies:read");
    let page = DynamicPolicy::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single dynamic policy
///
/// # Arguments
///
/// * `user` - The user that is getting this dynamic policy
/// * `state` - Shared aclforge objects
/// * `id` - The dynamic policy id
#[utoipa::path(
    get,
    path = "/api/v1/dynamic_policies/{id}",
    params(("id" = i64, Path, description = "The dynamic policy id")),
    responses(
        (status = 200, description = "Dynamic policy details", body = DynamicPolicy),
        (status = 404, description = "Dynamic policy not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::dynamic_policies::get_dynamic_policy", skip_all, err(Debug))]
async fn get_dynamic_policy(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DynamicPolicy>, ApiError> {
    require_scopes!(user, "dynamic_policies:read");
    let dynamic = DynamicPolicy::get(id, &state.shared).await?;
    Ok(Json(dynamic))
}

/// Replace a dynamic policy
///
/// # Arguments
///
/// * `user` - The user that is updating this dynamic policy
/// * `state` - Shared aclforge objects
/// * `id` - The dynamic policy id
/// * `request` - The dynamic policy request to apply
#[utoipa::path(
    put,
    path = "/api/v1/dynamic_policies/{id}",
    params(("id" = i64, Path, description = "The dynamic policy id")),
    responses(
        (status = 200, description = "Dynamic policy updated", body = DynamicPolicy),
        (status = 404, description = "Dynamic policy not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::dynamic_policies::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DynamicPolicyRequest>,
) -> Result<Json<DynamicPolicy>, ApiError> {
    require_scopes!(user, "dynamic_policies:write");
    let dynamic = DynamicPolicy::update(id, request, &state.shared).await?;
    Ok(Json(dynamic))
}

/// Delete a dynamic policy
///
/// # Arguments
///
/// * `user` - The user that is deleting this dynamic policy
/// * `state` - Shared aclforge objects
/// * `id` - The dynamic policy id
#[utoipa::path(
    delete,
    path = "/api/v1/dynamic_policies/{id}",
    params(("id" = i64, Path, description = "The dynamic policy id")),
    responses(
        (status = 204, description = "Dynamic policy deleted"),
        (status = 404, description = "Dynamic policy not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::dynamic_policies::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "dynamic_policies:write");
    DynamicPolicy::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_dynamic_policy, update, delete),
    components(schemas(DynamicPolicy, DynamicPolicyRequest, Page<DynamicPolicy>)),
)]
pub struct DynamicPolicyDocs;

/// Add the dynamic policy routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/dynamic_policies", get(list).post(create))
        .route(
            "/api/v1/dynamic_policies/{id}",
            get(get_dynamic_policy).put(update).delete(delete),
        )
}
