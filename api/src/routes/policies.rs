//! API routes for interacting with policies

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{ListParams, Page, Policy, PolicyRequest, PolicyUsage, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Creates a new policy
///
/// # Arguments
///
/// * `user` - The user that is creating this policy
/// * `state` - Shared aclforge objects
/// * `request` - The policy request
#[utoipa::path(
    post,
    path = "/api/v1/policies",
    responses(
        (status = 201, description = "Policy created", body = Policy),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policies::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<PolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    require_scopes!(user, "policies:write");
    let policy = Policy::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

/// Lists policies
///
/// # Arguments
///
/// * `user` - The user that is listing policies
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/policies",
    params(ListParams),
    responses((status = 200, description = "Policy list", body = Page<Policy>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policies::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Policy>>, ApiError> {
    require_scopes!(user, "policies:read");
    let page = Policy::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single policy
///
/// # Arguments
///
/// * `user` - The user that is getting this policy
/// * `state` - Shared aclforge objects
/// * `id` - The policy id
#[utoipa::path(
    get,
    path = "/api/v1/policies/{id}",
    params(("id" = i64, Path, description = "The policy id")),
    responses(
        (status = 200, description = "Policy details", body = Policy),
        (status = 404, description = "Policy not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policies::get_policy", skip_all, err(Debug))]
async fn get_policy(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Policy>, ApiError> {
    require_scopes!(user, "policies:read");
    let policy = Policy::get(id, &state.shared).await?;
    Ok(Json(policy))
}

/// Replace a policy
///
/// # Arguments
///
/// * `user` - The user that is updating this policy
/// * `state` - Shared aclforge objects
/// * `id` - The policy id
/// * `request` - The policy request to apply
#[utoipa::path(
    put,
    path = "/api/v1/policies/{id}",
    params(("id" = i64, Path, description = "The policy id")),
    responses(
        (status = 200, description = "Policy updated", body = Policy),
        (status = 404, description = "Policy not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policies::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PolicyRequest>,
) -> Result<Json<Policy>, ApiError> {
    require_scopes!(user, "policies:write");
    let policy = Policy::update(id, request, &state.shared).await?;
    Ok(Json(policy))
}

/// Delete a policy
///
/// # Arguments
///
/// * `user` - The user that is deleting this policy
/// * `state` - Shared aclforge objects
/// * `id` - The policy id
#[utoipa::path(
    delete,
    path = "/api/v1/policies/{id}",
    params(("id" = i64, Path, description = "The policy id")),
    responses(
        (status = 204, description = "Policy deleted"),
        (status = 403, description = "Policy is nested in another policy"),
        (status = 404, description = "Policy not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policies::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "policies:write");
    Policy::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the objects referencing a policy
///
/// # Arguments
///
/// * `user` - The user that is looking up this policy
/// * `state` - Shared aclforge objects
/// * `id` - The policy id
#[utoipa::path(
    get,
    path = "/api/v1/policies/{id}/usage",
    params(("id" = i64, Path, description = "The policy id")),
    responses(
        (status = 200, description = "Policy usage", body = PolicyUsage),
        (status = 404, description = "Policy not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policies::usage", skip_all, err(Debug))]
async fn usage(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PolicyUsage>, ApiError> {
    require_scopes!(user, "policies:read");
    let usage = Policy::usage(id, &state.shared).await?;
    Ok(Json(usage))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_policy, update, delete, usage),
    components(schemas(Policy, PolicyRequest, PolicyUsage, Page<Policy>)),
)]
pub struct PolicyDocs;

/// Add the policy routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/policies", get(list).post(create))
        .route(
            "/api/v1/policies/{id}",
            get(get_policy).put(update).delete(delete),
        )
        .route("/api/v1/policies/{id}/usage", get(usage))
}
