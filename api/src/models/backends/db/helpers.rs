//! Helpers for talking to the redis backend

use bb8_redis::{bb8, RedisConnectionManager};
use std::collections::HashMap;

use crate::utils::{ApiError, Shared};
use crate::{bad, unavailable};

/// Gets a connection from the connection pool
#[doc(hidden)]
#[macro_export]
macro_rules! conn {
    ($shared:expr) => {
        &mut *$crate::models::backends::db::helpers::get_conn($shared).await?
    };
}

/// Perform a non pipelined query to Redis
#[doc(hidden)]
#[macro_export]
macro_rules! query {
    ($cmd:expr, $shared:expr) => {
        $cmd.query_async($crate::conn!($shared))
    };
}

/// Gets a connection from the Redis connection pool
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
pub async fn get_conn(
    shared: &Shared,
) -> Result<bb8::PooledConnection<'_, RedisConnectionManager>, ApiError> {
    // get connection from redis pool
    match shared.redis.get().await {
        Ok(conn) => Ok(conn),
        Err(error) => unavailable!(format!("Failed to get connection from pool: {:#?}", error)),
    }
}

/// Extracts a value from a hashmap or returns a helpful error
///
/// # Arguments
///
/// * `map` - The hashmap to extract from
/// * `key` - The key to extract
pub fn extract(map: &mut HashMap<String, String>, key: &str) -> Result<String, ApiError> {
    match map.remove(key) {
        Some(value) => Ok(value),
        None => bad!(format!("Failed to extract {}", key)),
    }
}

/// Extracts an optional value from a hashmap
///
/// # Arguments
///
/// * `map` - The hashmap to extract from
/// * `key` - The key to extract
pub fn extract_opt(map: &mut HashMap<String, String>, key: &str) -> Option<String> {
    map.remove(key)
}

/// Coerces a string to a bool
///
/// # Arguments
///
/// * `key` - The name of the data that is being coerced
/// * `raw` - The string to coerce to a bool
pub fn coerce_bool(key: &str, raw: &str) -> Result<bool, ApiError> {
    match raw {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        val => bad!(format!("Failed to coerce {}({}) to bool", key, val)),
    }
}

/// Extracts a bool from a hashmap with a default
///
/// # Arguments
///
/// * `map` - The hashmap to extract from
/// * `key` - The key to extract
/// * `default` - The value to use when the key is missing
pub fn extract_bool_default(
    map: &mut HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ApiError> {
    match map.remove(key) {
        Some(raw) => coerce_bool(key, &raw),
        None => Ok(default),
    }
}
