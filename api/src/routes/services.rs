//! API routes for interacting with services

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{ListParams, Page, Service, ServiceRequest, ServiceUsage, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// Creates a new service
///
/// # Arguments
///
/// * `user` - The user that is creating this service
/// * `state` - Shared aclforge objects
/// * `request` - The service request
#[utoipa::path(
    post,
    path = "/api/v1/services",
    responses(
        (status = 201, description = "Service created", body = Service),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::services::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<ServiceRequest>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    require_scopes!(user, "services:write");
    let service = Service::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// Lists services
///
/// # Arguments
///
/// * `user` - The user that is listing services
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/services",
    params(ListParams),
    responses((status = 200, description = "Service list", body = Page<Service>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::services::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Service>>, ApiError> {
    require_scopes!(user, "services:read");
    let page = Service::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single service
///
/// # Arguments
///
/// * `user` - The user that is getting this service
/// * `state` - Shared aclforge objects
/// * `id` - The service id
#[utoipa::path(
    get,
    path = "/api/v1/services/{id}",
    params(("id" = i64, Path, description = "The service id")),
    responses(
        (status = 200, description = "Service details", body = Service),
        (status = 404, description = "Service not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::services::get_service", skip_all, err(Debug))]
async fn get_service(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Service>, ApiError> {
    require_scopes!(user, "services:read");
    let service = Service::get(id, &state.shared).await?;
    Ok(Json(service))
}

/// Replace a service
///
/// # Arguments
///
/// * `user` - The user that is updating this service
/// * `state` - Shared aclforge objects
/// * `id` - The service id
/// * `request` - The service request to apply
#[utoipa::path(
    put,
    path = "/api/v1/services/{id}",
    params(("id" = i64, Path, description = "The service id")),
    responses(
        (status = 200, description = "Service updated", body = Service),
        (status = 404, description = "Service not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::services::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ServiceRequest>,
) -> Result<Json<Service>, ApiError> {
    require_scopes!(user, "services:write");
    let service = Service::update(id, request, &state.shared).await?;
    Ok(Json(service))
}

/// Delete a service
///
/// # Arguments
///
/// * `user` - The user that is deleting this service
/// * `state` - Shared aclforge objects
/// * `id` - The service id
#[utoipa::path(
    delete,
    path = "/api/v1/services/{id}",
    params(("id" = i64, Path, description = "The service id")),
    responses(
        (status = 204, description = "Service deleted"),
        (status = 403, description = "Service is still nested"),
        (status = 404, description = "Service not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::services::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "services:write");
    Service::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the objects referencing a service
///
/// # Arguments
///
/// * `user` - The user that is looking up this service
/// * `state` - Shared aclforge objects
/// * `id` - The service id
#[utoipa::path(
    get,
    path = "/api/v1/services/{id}/usage",
    params(("id" = i64, Path, description = "The service id")),
    responses(
        (status = 200, description = "Service usage", body = ServiceUsage),
        (status = 404, description = "Service not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::services::usage", skip_all, err(Debug))]
async fn usage(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ServiceUsage>, ApiError> {
    require_scopes!(user, "services:read");
    let usage = Service::usage(id, &state.shared).await?;
    Ok(Json(usage))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_service, update, delete, usage),
    components(schemas(Service, ServiceRequest, ServiceUsage, Page<Service>)),
)]
pub struct ServiceDocs;

/// Add the service routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/services", get(list).post(create))
        .route(
            "/api/v1/services/{id}",
            get(get_service).put(update).delete(delete),
        )
        .route("/api/v1/services/{id}/usage", get(usage))
}
