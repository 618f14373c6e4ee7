//! API routes for interacting with policy tests

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::instrument;
use utoipa::{IntoParams, OpenApi};

use crate::models::{ListParams, Page, PolicyTest, PolicyTestRequest, TestRunReport, User};
use crate::require_scopes;
use crate::utils::{ApiError, AppState};

/// The query params selecting the policy to run tests against
#[derive(Debug, Deserialize, utoipa::ToSchema, IntoParams)]
struct RunTestParams {
    /// The policy to run tests against
    policy_id: Option<i64>,
    /// The dynamic policy to run tests against
    dynamic_policy_id: Option<i64>,
}

/// Creates a new test
///
/// # Arguments
///
/// * `user` - The user that is creating this test
/// * `state` - Shared aclforge objects
/// * `request` - The test request
#[utoipa::path(
    post,
    path = "/api/v1/tests",
    responses(
        (status = 201, description = "Test created", body = PolicyTest),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policy_tests::create", skip_all, err(Debug))]
async fn create(
    user: User,
    State(state): State<AppState>,
    Json(request): Json<PolicyTestRequest>,
) -> Result<(StatusCode, Json<PolicyTest>), ApiError> {
    require_scopes!(user, "tests:write");
    let test = PolicyTest::create(request, &state.shared).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

/// Lists tests
///
/// # Arguments
///
/// * `user` - The user that is listing tests
/// * `params` - The query params to use for this request
/// * `state` - Shared aclforge objects
#[utoipa::path(
    get,
    path = "/api/v1/tests",
    params(ListParams),
    responses((status = 200, description = "Test list", body = Page<PolicyTest>)),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policy_tests::list", skip_all, err(Debug))]
async fn list(
    user: User,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<Page<PolicyTest>>, ApiError> {
    require_scopes!(user, "tests:read");
    let page = PolicyTest::list(params, &state.shared).await?;
    Ok(Json(page))
}

/// Get details on a single test
///
/// # Arguments
///
/// * `user` - The user that is getting this test
/// * `state` - Shared aclforge objects
/// * `id` - The test id
#[utoipa::path(
    get,
    path = "/api/v1/tests/{id}",
    params(("id" = i64, Path, description = "The test id")),
    responses(
        (status = 200, description = "Test details", body = PolicyTest),
        (status = 404, description = "Test not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policy_tests::get_test", skip_all, err(Debug))]
async fn get_test(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PolicyTest>, ApiError> {
    require_scopes!(user, "tests:read");
    let test = PolicyTest::get(id, &state.shared).await?;
    Ok(Json(test))
}

/// Replace a test
///
/// # Arguments
///
/// * `user` - The user that is updating this test
/// * `state` - Shared aclforge objects
/// * `id` - The test id
/// * `request` - The test request to apply
#[utoipa::path(
    put,
    path = "/api/v1/tests/{id}",
    params(("id" = i64, Path, description = "The test id")),
    responses(
        (status = 200, description = "Test updated", body = PolicyTest),
        (status = 404, description = "Test not found"),
        (status = 422, description = "The request is invalid"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policy_tests::update", skip_all, err(Debug))]
async fn update(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PolicyTestRequest>,
) -> Result<Json<PolicyTest>, ApiError> {
    require_scopes!(user, "tests:write");
    let test = PolicyTest::update(id, request, &state.shared).await?;
    Ok(Json(test))
}

/// Delete a test
///
/// # Arguments
///
/// * `user` - The user that is deleting this test
/// * `state` - Shared aclforge objects
/// * `id` - The test id
#[utoipa::path(
    delete,
    path = "/api/v1/tests/{id}",
    params(("id" = i64, Path, description = "The test id")),
    responses(
        (status = 204, description = "Test deleted"),
        (status = 404, description = "Test not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policy_tests::delete", skip_all, err(Debug))]
async fn delete(
    user: User,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_scopes!(user, "tests:write");
    PolicyTest::delete(id, &state.shared).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run every test covering a policy or dynamic policy
///
/// Reports each case outcome, the terms no passing case selected and the
/// resulting coverage.
///
/// # Arguments
///
/// * `user` - The user that is running tests
/// * `state` - Shared aclforge objects
/// * `params` - The policy to run tests against
#[utoipa::path(
    get,
    path = "/api/v1/run_tests",
    params(RunTestParams),
    responses(
        (status = 200, description = "Test run report", body = TestRunReport),
        (status = 400, description = "Neither policy id was given"),
        (status = 404, description = "Policy not found"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::policy_tests::run_tests", skip_all, err(Debug))]
async fn run_tests(
    user: User,
    State(state): State<AppState>,
    Query(params): Query<RunTestParams>,
) -> Result<Json<TestRunReport>, ApiError> {
    require_scopes!(user, "policies:read", "dynamic_policies:read");
    let report = PolicyTest::run(params.policy_id, params.dynamic_policy_id, &state.shared).await?;
    Ok(Json(report))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(
    paths(create, list, get_test, update, delete, run_tests),
    components(schemas(PolicyTest, PolicyTestRequest, TestRunReport, Page<PolicyTest>)),
)]
pub struct PolicyTestDocs;

/// Add the test routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/tests", get(list).post(create))
        .route(
            "/api/v1/tests/{id}",
            get(get_test).put(update).delete(delete),
        )
        .route("/api/v1/run_tests", get(run_tests))
}
