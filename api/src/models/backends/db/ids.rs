//! Allocates monotonically increasing entity ids

use bb8_redis::redis::cmd;
use tracing::instrument;

use super::keys::IdKeys;
use crate::query;
use crate::utils::{ApiError, Shared};

/// Allocate the next id for an entity kind
///
/// # Arguments
///
/// * `kind` - The entity kind to allocate an id for
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::ids::next", skip(shared), err(Debug))]
pub async fn next(kind: &str, shared: &Shared) -> Result<i64, ApiError> {
    // build the key to this kinds counter
    let key = IdKeys::counter(kind, shared);
    // counters start at 0 so the first allocated id is 1
    let id: i64 = query!(cmd("incr").arg(&key), shared).await?;
    Ok(id)
}

/// Reserve a contiguous range of ids for an entity kind
///
/// Returns the first id of the reserved range.
///
/// # Arguments
///
/// * `kind` - The entity kind to reserve ids for
/// * `count` - How many ids to reserve
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::ids::reserve", skip(shared), err(Debug))]
pub async fn reserve(kind: &str, count: i64, shared: &Shared) -> Result<i64, ApiError> {
    if count == 0 {
        return Ok(0);
    }
    // build the key to this kinds counter
    let key = IdKeys::counter(kind, shared);
    // the counter lands on the end of the reserved range
    let end: i64 = query!(cmd("incrby").arg(&key).arg(count), shared).await?;
    Ok(end - count + 1)
}
