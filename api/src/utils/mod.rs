//! Shared utilities for the aclforge API

pub mod bounder;
mod errors;
mod macros;
mod shared;
pub mod trace;

pub use errors::ApiError;
pub use shared::{AppState, Shared};
