//! API routes for interacting with revisions

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tracing::instrument;
use utoipa::{IntoParams, OpenApi};

use crate::models::{
    revision_hash, DeployReceipt, ListParams, Page, Revision, RevisionRequest, User,
};
use crate::utils::{ApiError, AppState};
use crate::{forbidden, not_found, require_scopes};

/// The query params selecting the target of a raw config read
#[derive(Debug, Deserialize, utoipa::ToSchema, IntoParams)]
struct RawConfigParams {
    /// The target whose config to read
    target_id: i64,
}

/// Creates a new revision behind the coverage gate
///
/// # Arguments
///
/// * `user` - The user that is creating this revision
/// * `state` - Shared aclforge objects
/// * `request` - The revision request
#[utoipa::path(
    post,
    path = "/api/v1/revisions",
    responses(
        (status = 201, description = "Revision created", body = Revision),
        (status = 403, description = "Test coverage is below 100%"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<RevisionRequest>,
) -> Result<(StatusCode, Json<Revision>), ApiError> {
    require_scopes!(user, "revisions:write");
    let revision = Revision::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(revision)))
}

/// Lists revisions
///
/// # Arguments
///
/// * `user` - The user that is listing revisions
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/revisions",
    params(ListParams),
    responses((status = 200, description = "Revision list", body = Page<Revision>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<Revision>>, ApiError> {
    require_scopes!(user, "revisions:read");
    let page = Revision::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single revision
///
/// # Arguments
///
/// * `user` - The user that is getting this revision
/// * `state` - Shared aclforge objects
/// * `id` - The revision id
#[utoipa::path(
    get,
    path = "/api/v1/revisions/{id}",
    params(("id" = i64, Path, description = "The revision id")),
    responses(
        (status = 200, description = "Revision details", body = Revision),
        (status = 404, description = "Revision not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::get_revision", skip_all, err(Debug))]
async fn get_revision(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Revision>, ApiError> {
    require_scopes!(user, "revisions:read");
    let revision = Revision::get(id, &state.shared).await?;
    Ok(Json(revision))
}

/// Reject updates to a revision
///
/// Revision snapshots are frozen at creation so updates are refused.
///
/// # Arguments
///
/// * `user` - The user that tried to update this revision
#[utoipa::path(
    put,
    path = "/api/v1/revisions/{id}",
    params(("id" = i64, Path, description = "The revision id")),
    responses((status = 403, description = "Revision snapshots are immutable")),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::update", skip_all, err(Debug))]
async fn update(user: User, Path(_id): Path<i64>) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "revisions:write");
    forbidden!("Revision snapshots are immutable".to_owned())
}

/// Delete a revision
///
/// # Arguments
///
/// * `user` - The user that is deleting this revision
/// * `state` - Shared aclforge objects
/// * `id` - The revision id
#[utoipa::path(
    delete,
    path = "/api/v1/revisions/{id}",
    params(("id" = i64, Path, description = "The revision id")),
    responses(
        (status = 204, description = "Revision deleted"),
        (status = 404, description = "Revision not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "revisions:write");
    Revision::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the raw config text for a revision and target
///
/// # Arguments
///
/// * `user` - The user that is reading this config
/// * `state` - Shared aclforge objects
/// * `id` - The revision id
/// * `params` - The target whose config to read
#[utoipa::path(
    get,
    path = "/api/v1/revisions/{id}/raw_config",
    params(
        ("id" = i64, Path, description = "The revision id"),
        RawConfigParams,
    ),
    responses(
        (status = 200, description = "The raw config text", body = String),
        (status = 404, description = "Revision config not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::raw_config", skip_all, err(Debug))]
async fn raw_config(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<RawConfigParams>,
) -> Result<String, ApiError> {
    require_scopes!(user, "revisions:read");
    Revision::raw_config(id, params.target_id, &state.shared).await
}

/// Serve a raw config to a device pulling it over http
///
/// The url carries a blake2b hash of the stored config instead of a bearer
/// token; any other hash is a 404.
///
/// # Arguments
///
/// * `state` - Shared aclforge objects
/// * `path` - The revision, target and authorising hash
#[utoipa::path(
    get,
    path = "/api/v1/revisions/{id}/raw_config/{target_id}/{hash}",
    params(
        ("id" = i64, Path, description = "The revision id"),
        ("target_id" = i64, Path, description = "The target whose config to read"),
        ("hash" = String, Path, description = "The blake2b hash of the stored config"),
    ),
    responses(
        (status = 200, description = "The raw config text", body = String),
        (status = 404, description = "Revision config not found or bad hash"),
    ),
)]
#[instrument(name = "routes::revisions::raw_config_pull", skip_all, err(Debug))]
async fn raw_config_pull(
    State(state): State<AppState>,
    Path((id, target_id, hash)): Path<(i64, i64, String)>,
) -> Result<String, ApiError> {
    let config = Revision::raw_config(id, target_id, &state.shared).await?;
    // the hash in the url authorises this pull
    if revision_hash(&config) != hash {
        return not_found!("RevisionConfig not found".to_owned());
    }
    Ok(config)
}

/// Queue deploy jobs for every deployer bound to this revisions targets
///
/// # Arguments
///
/// * `user` - The user that is deploying this revision
/// * `state` - Shared aclforge objects
/// * `id` - The revision id
#[utoipa::path(
    post,
    path = "/api/v1/revisions/{id}/deploy",
    params(("id" = i64, Path, description = "The revision id")),
    responses(
        (status = 201, description = "Deployments queued", body = DeployReceipt),
        (status = 404, description = "No deployers matched this revision"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::revisions::deploy", skip_all, err(Debug))]
async fn deploy(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<DeployReceipt>), ApiError> {
    require_scopes!(user, "deployments:write");
    let receipt = Revision::deploy(id, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(
        create,
        list,
        get_revision,
        update,
        delete,
        raw_config,
        raw_config_pull,
        deploy
    ),
    components(schemas(Revision, RevisionRequest, DeployReceipt, Page<Revision>)),
)]
pub struct RevisionDocs;

/// Add the revision routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/revisions", get(list).post(create))
        .route(
            "/api/v1/revisions/{id}",
            get(get_revision).put(update).delete(delete),
        )
        .route("/api/v1/revisions/{id}/raw_config", get(raw_config))
        .route(
            "/api/v1/revisions/{id}/raw_config/{target_id}/{hash}",
            get(raw_config_pull),
        )
        .route("/api/v1/revisions/{id}/deploy", post(deploy))
}
