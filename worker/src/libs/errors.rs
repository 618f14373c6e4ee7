//! The error type for the aclforge deploy worker

use std::fmt;

/// An error from a deploy job or the worker loop
#[derive(Debug)]
pub struct Error {
    /// The message describing what went wrong
    msg: String,
}

impl Error {
    /// Create a new error
    ///
    /// # Arguments
    ///
    /// * `msg` - The message describing what went wrong
    pub fn new<T: Into<String>>(msg: T) -> Self {
        Error { msg: msg.into() }
    }

    /// Get this errors message
    #[must_use]
    pub fn msg(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for Error {}

impl From<aclforge::utils::ApiError> for Error {
    fn from(error: aclforge::utils::ApiError) -> Self {
        Error::new(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::new(format!("IO error: {error}"))
    }
}

impl From<std::env::VarError> for Error {
    fn from(error: std::env::VarError) -> Self {
        Error::new(format!("Env var error: {error}"))
    }
}

impl From<git2::Error> for Error {
    fn from(error: git2::Error) -> Self {
        Error::new(format!("Git error: {error}"))
    }
}

impl From<openssh::Error> for Error {
    fn from(error: openssh::Error) -> Self {
        Error::new(format!("SSH error: {error}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::new(format!("Serialization error: {error}"))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::new("Remote command timed out after 60 seconds")
    }
}
