//! API routes for authentication

use axum::extract::{Form, Json, State};
use axum::routing::{get, post};
use axum::Router;
use tracing::instrument;
use utoipa::OpenApi;

use crate::models::{AccessToken, TokenForm, User};
use crate::unauthorized;
use crate::utils::{ApiError, AppState};

/// Issue a bearer token for a password grant
///
/// The credentials are checked with an ldap simple bind and the minted token
/// carries the full scope set.
///
/// # Arguments
///
/// * `state` - Shared aclforge objects
/// * `form` - The username and password to bind with
#[utoipa::path(
    post,
    path = "/api/v1/token",
    responses(
        (status = 200, description = "A freshly minted token", body = AccessToken),
        (status = 401, description = "The credentials were rejected"),
    ),
)]
#[instrument(name = "routes::users::token", skip_all, err(Debug))]
async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<AccessToken>, ApiError> {
    if form.username.is_empty() || form.password.is_empty() {
        return unauthorized!("Incorrect username or password".to_owned());
    }
    // bind against ldap and mint a signed token
    let user = User::authenticate(&form, &state.shared).await?;
    let token = user.mint_token(&state.shared)?;
    Ok(Json(token))
}

/// Get the user behind the current token
///
/// # Arguments
///
/// * `user` - The user that made this request
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "The current user", body = User),
        (status = 401, description = "This user is not authorized to access this route"),
    ),
    security(("bearer" = [])),
)]
#[instrument(name = "routes::users::me", skip_all, err(Debug))]
async fn me(user: User) -> Result<Json<User>, ApiError> {
    Ok(Json(user))
}

/// The struct containing our openapi docs
#[derive(OpenApi)]
#[openapi(paths(token, me), components(schemas(AccessToken, TokenForm, User)))]
pub struct UserDocs;

/// Add the auth routes to our router
///
/// # Arguments
///
// * `router` - The router to add routes too
pub fn mount(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/v1/token", post(token))
        .route("/api/v1/me", get(me))
}
