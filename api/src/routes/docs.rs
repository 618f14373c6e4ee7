//! Serves the merged openapi document for the API

use axum::extract::Json;
use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;

use crate::utils::AppState;

/// Build the merged openapi docs for every route module
#[must_use]
pub fn build() -> utoipa::openapi::OpenApi {
    let mut api = super::basic::BasicDocs::openapi();
    api.merge(super::users::UserDocs::openapi());
    api.merge(super::networks::NetworkDocs::openapi());
    api.merge(super::services::ServiceDocs::openapi());
    api.merge(super::policies::PolicyDocs::openapi());
    api.merge(super::dynamic_policies::DynamicPolicyDocs::openapi());
    api.merge(super::targets::TargetDocs::openapi());
    api.merge(super::policy_tests::PolicyTestDocs::openapi());
    api.merge(super::deployers::DeployerDocs::openapi());
    api.merge(super::deployments::DeploymentDocs::openapi());
    api.merge(super::revisions::RevisionDocs::openapi());
    api
}

/// Return the openapi docs for this API
async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(build())
}

/// Add the docs routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router.route("/api/v1/docs/openapi.json", get(openapi))
}
