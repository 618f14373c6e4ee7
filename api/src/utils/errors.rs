//! The error class for the aclforge API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::fmt;
use tracing::{event, span, Level};
use utoipa::ToSchema;

/// Builds an error http response
#[derive(Debug, ToSchema, Serialize)]
pub struct ApiError {
    /// The status code to return
    #[serde(skip)]
    pub code: StatusCode,
    /// The error message to return
    pub msg: Option<String>,
    /// Per field validation errors to return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, String>>,
}

impl ApiError {
    /// creates a new error object
    ///
    /// # Arguments
    ///
    /// * `code` - status of error response
    /// * `msg` - message to put in the response
    #[must_use]
    pub fn new(code: StatusCode, msg: Option<String>) -> ApiError {
        ApiError {
            code,
            msg,
            fields: None,
        }
    }

    /// creates a new validation error tied to a single field
    ///
    /// # Arguments
    ///
    /// * `field` - The field that failed validation
    /// * `msg` - The reason this field is invalid
    #[must_use]
    pub fn invalid<F: Into<String>, M: Into<String>>(field: F, msg: M) -> ApiError {
        // build the per field error map
        let mut fields = HashMap::with_capacity(1);
        fields.insert(field.into(), msg.into());
        ApiError {
            code: StatusCode::UNPROCESSABLE_ENTITY,
            msg: None,
            fields: Some(fields),
        }
    }
}

impl IntoResponse for ApiError {
    /// Allow Axum to build a response from error messages
    fn into_response(self) -> Response {
        // check if we have per field errors or a single message
        if let Some(fields) = self.fields {
            // log the field errors
            let span = span!(Level::ERROR, "Validation Errors");
            event!(parent: &span, Level::ERROR, fields = fields.len());
            // wrap our field errors in the validation error body
            let err_json = Json(serde_json::json!({ "errors": fields }));
            return (self.code, err_json).into_response();
        }
        match self.msg {
            // we have a message so build our error response
            Some(msg) => {
                // log this error msg
                let span = span!(Level::ERROR, "Error Message");
                event!(parent: &span, Level::ERROR, msg = &msg,);
                // wrap our message in a json object
                let err_json = Json(serde_json::json!({ "error": msg }));
                (self.code, err_json).into_response()
            }
            // we do not have an error message so just return the code
            None => self.code.into_response(),
        }
    }
}

/// 400 bad request
#[macro_export]
macro_rules! bad {
    ($($msg:tt)+) => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::BAD_REQUEST, Some($($msg)+)))}
}

/// 409 conflict
#[macro_export]
macro_rules! conflict {
    ($($msg:tt)+) => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::CONFLICT, Some($($msg)+)))}
}

/// 404 not found
#[macro_export]
macro_rules! not_found {
    ($($msg:tt)+) => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::NOT_FOUND, Some($($msg)+)))}
}

/// 403 forbidden
#[macro_export]
macro_rules! forbidden {
    ($($msg:tt)+) => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::FORBIDDEN, Some($($msg)+)))}
}

/// 422 unprocessable entity with a per field error map
#[macro_export]
macro_rules! invalid {
    ($field:expr, $msg:expr) => {
        Err($crate::utils::ApiError::invalid($field, $msg))
    };
}

/// 500 internal server error
#[macro_export]
macro_rules! internal_err {
    () => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::INTERNAL_SERVER_ERROR, None))};
    ($($msg:tt)+) => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::INTERNAL_SERVER_ERROR, Some($($msg)+)))}
}

/// 503 service unavailable
#[macro_export]
macro_rules! unavailable {
    ($($msg:tt)+) => {Err($crate::utils::ApiError::new(axum::http::status::StatusCode::SERVICE_UNAVAILABLE, Some($($msg)+)))}
}

/// 401 unauthorized
#[macro_export]
macro_rules! unauthorized {
    () => {
        Err($crate::utils::ApiError::new(
            axum::http::status::StatusCode::UNAUTHORIZED,
            None,
        ))
    };
    ($msg:expr) => {
        Err($crate::utils::ApiError::new(
            axum::http::status::StatusCode::UNAUTHORIZED,
            Some($msg),
        ))
    };
}

/// 400 bad request without the Err wrap
#[macro_export]
macro_rules! bad_internal {
    ($($msg:tt)+) => {$crate::utils::ApiError::new(axum::http::status::StatusCode::BAD_REQUEST, Some($($msg)+))}
}

impl fmt::Display for ApiError {
    /// Cast this error to either a string based on the message or the code
    ///
    /// # Arguments
    ///
    /// * `f` - The formatter that is being used
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.msg {
            Some(msg) => write!(f, "{msg}"),
            // if we have a status code then return that and the reason if one exists
            None => write!(f, "code {} - {}", self.code.as_u16(), self.code),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        bad_internal!(format!("Failed to cast JsonValue to String {:#?}", error))
    }
}

impl From<std::num::ParseIntError> for ApiError {
    fn from(error: std::num::ParseIntError) -> Self {
        bad_internal!(format!("Failed cast to int {:#?}", error))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        bad_internal!(format!("IO Error {:#?}", error))
    }
}

impl From<chrono::format::ParseError> for ApiError {
    fn from(error: chrono::format::ParseError) -> Self {
        bad_internal!(format!("Failed to parse timestamp {:#?}", error))
    }
}

impl From<ldap3::result::LdapError> for ApiError {
    fn from(error: ldap3::result::LdapError) -> Self {
        bad_internal!(format!("ldap error {:#?}", error))
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        ApiError::new(
            StatusCode::UNAUTHORIZED,
            Some(format!("token error {error:#?}")),
        )
    }
}

impl From<cidr::errors::NetworkParseError> for ApiError {
    fn from(error: cidr::errors::NetworkParseError) -> Self {
        bad_internal!(format!("Error parsing CIDR: {error}"))
    }
}

impl From<std::net::AddrParseError> for ApiError {
    fn from(error: std::net::AddrParseError) -> Self {
        bad_internal!(format!("Error parsing IP address: {error}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        bad_internal!(format!("Tokio task failed to join: {:#?}", error))
    }
}
