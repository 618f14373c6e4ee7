//! Stores deployers in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::DeployerKeys;
use crate::models::Deployer;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a deployer
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a deployer
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Deployer, ApiError> {
    if raw.is_empty() {
        return not_found!("deployer not found".to_owned());
    }
    let deployer = Deployer {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        mode: deserialize_ext!(raw, "mode"),
        target_id: extract!(raw, "target_id").parse::<i64>()?,
        config: deserialize_ext!(raw, "config"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(deployer)
}

/// Builds a pipeline that saves a deployers data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The deployer to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Deployer,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = DeployerKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("mode").arg(serialize!(&cast.mode))
        .cmd("hset").arg(&data).arg("target_id").arg(cast.target_id)
        .cmd("hset").arg(&data).arg("config").arg(serialize!(&cast.config))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(DeployerKeys::set(shared)).arg(cast.id);
    Ok(pipe)
}

/// Creates a deployer in redis
///
/// # Arguments
///
/// * `cast` - The deployer to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::deployers::create", skip_all, err(Debug))]
pub async fn create(cast: Deployer, shared: &Shared) -> Result<Deployer, ApiError> {
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(DeployerKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("deployer {} already exists", cast.name));
    }
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a deployer from redis
///
/// # Arguments
///
/// * `id` - The id of the deployer to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::deployers::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Deployer, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(DeployerKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every deployer from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::deployers::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Deployer>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(DeployerKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(DeployerKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Builds a pipeline that removes a deployer from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The deployer to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Deployer,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(DeployerKeys::data(cast.id, shared))
        .cmd("srem").arg(DeployerKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(DeployerKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a deployer
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this deployer had
/// * `cast` - The deployer being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &Deployer,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(DeployerKeys::names(shared)).arg(old)
        .cmd("hset").arg(DeployerKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different deployer
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The deployer id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::deployers::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> =
        query!(cmd("hget").arg(DeployerKeys::names(shared)).arg(name), shared).await?;
    Ok(owner.is_some_and(|owner| owner != id))
}
