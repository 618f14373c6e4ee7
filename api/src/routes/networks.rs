//! API routes for interacting with networks

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{ListParams, Network, NetworkRequest, NetworkUsage, Page, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Creates a new network
///
/// # Arguments
///
/// * `user` - The user that is creating this network
/// * `state` - Shared aclforge objects
/// * `request` - The network request
#[utoipa::path(
    post,
    path = "/api/v1/networks",
    responses(
        (status = 201, description = "Network created", body = Network),
        (status = 401, description = "This user is not authorized to access this route"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::networks::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<NetworkRequest>,
) -> Result<(StatusCode, Json<Network>), ApiError> {
    require_scopes!(user, "networks:write");
    let network = Network::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(network)))
}

/// Lists networks
///
/// # Arguments
///
/// * `user` - The user that is listing networks
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/networks",
    params(ListParams),
    responses(
        (status = 200, description = "Network list", body = Page<Network>),
        (status = 401, description = "This user is not authorized to access this route"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::networks::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Network>>, ApiError> {
    require_scopes!(user, "networks:read");
    let page = Network::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single network
///
/// # Arguments
///
/// * `user` - The user that is getting this network
/// * `state` - Shared aclforge objects
/// * `id` - The network id
#[utoipa::path(
    get,
    path = "/api/v1/networks/{id}",
    params(("id" = i64, Path, description = "The network id")),
    responses(
        (status = 200, description = "Network details", body = Network),
        (status = 404, description = "Network not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::networks::get_network", skip_all, err(Debug))]
async fn get_network(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Network>, ApiError> {
    require_scopes!(user, "networks:read");
    let network = Network::get(id, &state.shared).await?;
    Ok(Json(network))
}

/// Replace a network
///
/// # Arguments
///
/// * `user` - The user that is updating this network
/// * `state` - Shared aclforge objects
/// * `id` - The network id
/// * `request` - The network request to apply
#[utoipa::path(
    put,
    path = "/api/v1/networks/{id}",
    params(("id" = i64, Path, description = "The network id")),
    responses(
        (status = 200, description = "Network updated", body = Network),
        (status = 404, description = "Network not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::networks::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<NetworkRequest>,
) -> Result<Json<Network>, ApiError> {
    require_scopes!(user, "networks:write");
    let network = Network::update(id, request, &state.shared).await?;
    Ok(Json(network))
}

/// Delete a network
///
/// # Arguments
///
/// * `user` - The user that is deleting this network
/// * `state` - Shared aclforge objects
/// * `id` - The network id
#[utoipa::path(
    delete,
    path = "/api/v1/networks/{id}",
    params(("id" = i64, Path, description = "The network id")),
    responses(
        (status = 204, description = "Network deleted"),
        (status = 403, description = "Network is still nested"),
        (status = 404, description = "Network not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::networks::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "networks:write");
    Network::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the objects referencing a network
///
/// # Arguments
///
/// * `user` - The user that is looking up this network
/// * `state` - Shared aclforge objects
/// * `id` - The network id
#[utoipa::path(
    get,
    path = "/api/v1/networks/{id}/usage",
    params(("id" = i64, Path, description = "The network id")),
    responses(
        (status = 200, description = "Network usage", body = NetworkUsage),
        (status = 404, description = "Network not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::networks::usage", skip_all, err(Debug))]
async fn usage(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NetworkUsage>, ApiError> {
    require_scopes!(user, "networks:read");
    let usage = Network::usage(id, &state.shared).await?;
    Ok(Json(usage))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_network, update, delete, usage),
    components(schemas(Network, NetworkRequest, NetworkUsage, Page<Network>)),
)]
pub struct NetworkDocs;

/// Add the network routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/networks", get(list).post(create))
        .route(
            "/api/v1/networks/{id}",
            get(get_network).put(update).delete(delete),
        )
        .route("/api/v1/networks/{id}/usage", get(usage))
}
