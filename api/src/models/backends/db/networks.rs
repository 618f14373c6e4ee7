//! Stores networks in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::NetworkKeys;
use crate::models::Network;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a network
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a network
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Network, ApiError> {
    // return 404 if the hashmap is empty
    if raw.is_empty() {
        return not_found!("network not found".to_owned());
    }
    let network = Network {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        addresses: deserialize_ext!(raw, "addresses"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(network)
}

/// Builds a pipeline that saves a networks data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The network to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Network,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    // build keys to this networks data
    let data = NetworkKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("addresses").arg(serialize!(&cast.addresses))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(NetworkKeys::set(shared)).arg(cast.id);
    Ok(pipe)
}

/// Creates a network in redis
///
/// # Arguments
///
/// * `cast` - The network to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::networks::create", skip_all, err(Debug))]
pub async fn create(cast: Network, shared: &Shared) -> Result<Network, ApiError> {
    // claim this networks name or bail on a conflict
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(NetworkKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("network {} already exists", cast.name));
    }
    // save this networks data
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a network from redis
///
/// # Arguments
///
/// * `id` - The id of the network to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::networks::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Network, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(NetworkKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every network from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::networks::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Network>, ApiError> {
    // get the ids of all networks
    let ids: Vec<i64> = query!(cmd("smembers").arg(NetworkKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    // get the data for each network in one round trip
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(NetworkKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Check whether a set of networks exist in redis
///
/// # Arguments
///
/// * `ids` - The network ids to check
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::networks::exists", skip(shared), err(Debug))]
pub async fn exists(ids: &[i64], shared: &Shared) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let key = NetworkKeys::set(shared);
    let checks: Vec<bool> = ids
        .iter()
        .fold(redis::pipe().atomic(), |pipe, id| {
            pipe.cmd("sismember").arg(&key).arg(id)
        })
        .query_async(conn!(shared))
        .await?;
    if checks.iter().any(|check| !check) {
        return not_found!(format!("{ids:?} must all be valid networks"));
    }
    Ok(())
}

/// Builds a pipeline that removes a network from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The network to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Network,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(NetworkKeys::data(cast.id, shared))
        .cmd("srem").arg(NetworkKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(NetworkKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a network
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this network had
/// * `cast` - The network being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &Network,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(NetworkKeys::names(shared)).arg(old)
        .cmd("hset").arg(NetworkKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different network
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The network id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::networks::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> =
        query!(cmd("hget").arg(NetworkKeys::names(shared)).arg(name), shared).await?;
    Ok(owner.is_some_and(|owner| owner != id))
}
