//! Authenticates users against ldap and mints bearer tokens

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::typed_header::TypedHeader;
use chrono::Utc;
use headers::authorization::{Authorization, Bearer};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use ldap3::{Scope, SearchEntry};
use tracing::{event, instrument, Level};

use crate::models::{AccessToken, TokenClaims, TokenForm, User, ALL_SCOPES};
use crate::utils::{ApiError, AppState, Shared};
use crate::{ldap, unauthorized, unavailable};

impl User {
    /// Authenticate a user with an ldap simple bind
    ///
    /// On a successful bind the users display name and email are pulled from
    /// the configured attributes.
    ///
    /// # Arguments
    ///
    /// * `form` - The username and password to bind with
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "User::authenticate", skip_all, fields(user = form.username), err(Debug))]
    pub async fn authenticate(form: &TokenForm, shared: &Shared) -> Result<User, ApiError> {
        let Some(ldap_conf) = &shared.config.aclforge.auth.ldap else {
            return unavailable!("ldap is not configured!".to_owned());
        };
        // build an ldap connection
        let (conn, mut ldap) = ldap!(ldap_conf).await?;
        ldap3::drive!(conn);
        // try to bind to ldap with this users creds
        let bind_dn = format!(
            "{}{}{}",
            ldap_conf.user_prepend, form.username, ldap_conf.user_append
        );
        let bound = ldap.simple_bind(&bind_dn, &form.password).await?.success();
        if bound.is_err() {
            event!(Level::ERROR, msg = "ldap bind rejected");
            return unauthorized!();
        }
        // pull this users attributes
        let filter = format!("({}={})", ldap_conf.username_attr, form.username);
        let attrs = vec![
            ldap_conf.username_attr.clone(),
            ldap_conf.name_attr.clone(),
            ldap_conf.email_attr.clone(),
        ];
        let search = ldap
            .search(&ldap_conf.search_base, Scope::Subtree, &filter, attrs)
            .await?
            .success();
        let mut user = User {
            username: form.username.clone(),
            full_name: None,
            email: None,
            scopes: ALL_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
        };
        if let Ok((results, _)) = search {
            if let Some(entry) = results.into_iter().next() {
                let entry = SearchEntry::construct(entry);
                user.full_name = entry
                    .attrs
                    .get(&ldap_conf.name_attr)
                    .and_then(|values| values.first().cloned());
                user.email = entry
                    .attrs
                    .get(&ldap_conf.email_attr)
                    .and_then(|values| values.first().cloned());
            }
        }
        // unbind our ldap socket
        ldap.unbind().await?;
        Ok(user)
    }

    /// Mint a signed bearer token for this user
    ///
    /// # Arguments
    ///
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "User::mint_token", skip_all, fields(user = self.username), err(Debug))]
    pub fn mint_token(&self, shared: &Shared) -> Result<AccessToken, ApiError> {
        let jwt = &shared.config.aclforge.auth.jwt;
        let claims = TokenClaims {
            sub: self.username.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            scopes: self.scopes.clone(),
            exp: (Utc::now() + chrono::Duration::minutes(jwt.token_expire)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt.secret_key.as_bytes()),
        )?;
        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".to_owned(),
        })
    }

    /// Validate a bearer token and rebuild its user
    ///
    /// # Arguments
    ///
    /// * `token` - The bearer token to validate
    /// * `shared` - Shared aclforge objects
    pub fn from_token(token: &str, shared: &Shared) -> Result<User, ApiError> {
        let jwt = &shared.config.aclforge.auth.jwt;
        let decoded = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(jwt.secret_key.as_bytes()),
            &Validation::default(),
        )?;
        Ok(User {
            username: decoded.claims.username,
            full_name: decoded.claims.full_name,
            email: decoded.claims.email,
            scopes: decoded.claims.scopes,
        })
    }
}

impl<S> FromRequestParts<S> for User
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    /// Authenticate the user a request was made by
    ///
    /// # Arguments
    ///
    /// * `parts` - The request parts to extract our bearer token from
    /// * `state` - Shared aclforge objects
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let shared: &Shared = &state.shared;
        // pull the bearer token off the authorization header
        let Ok(TypedHeader(Authorization(bearer))) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
        else {
            return unauthorized!("Could not validate credentials".to_owned());
        };
        User::from_token(bearer.token(), shared)
    }
}
