//! Stores targets in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::TargetKeys;
use crate::models::Target;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a target
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a target
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Target, ApiError> {
    if raw.is_empty() {
        return not_found!("target not found".to_owned());
    }
    let target = Target {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        generator: deserialize_ext!(raw, "generator"),
        inet_mode: deserialize_ext!(raw, "inet_mode"),
        substitutions: deserialize_ext!(raw, "substitutions"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(target)
}

/// Builds a pipeline that saves a targets data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The target to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Target,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = TargetKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("generator").arg(serialize!(&cast.generator))
        .cmd("hset").arg(&data).arg("inet_mode").arg(serialize!(&cast.inet_mode))
        .cmd("hset").arg(&data).arg("substitutions").arg(serialize!(&cast.substitutions))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(TargetKeys::set(shared)).arg(cast.id);
    Ok(pipe)
}

/// Creates a target in redis
///
/// # Arguments
///
/// * `cast` - The target to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::targets::create", skip_all, err(Debug))]
pub async fn create(cast: Target, shared: &Shared) -> Result<Target, ApiError> {
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(TargetKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("target {} already exists", cast.name));
    }
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a target from redis
///
/// # Arguments
///
/// * `id` - The id of the target to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::targets::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Target, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(TargetKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every target from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::targets::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Target>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(TargetKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(TargetKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Check whether a set of targets exist in redis
///
/// # Arguments
///
/// * `ids` - The target ids to check
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::targets::exists", skip(shared), err(Debug))]
pub async fn exists(ids: &[i64], shared: &Shared) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let key = TargetKeys::set(shared);
    let checks: Vec<bool> = ids
        .iter()
        .fold(redis::pipe().atomic(), |pipe, id| {
            pipe.cmd("sismember").arg(&key).arg(id)
        })
        .query_async(conn!(shared))
        .await?;
    if checks.iter().any(|check| !check) {
        return not_found!(format!("{ids:?} must all be valid targets"));
    }
    Ok(())
}

/// Builds a pipeline that removes a target from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The target to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Target,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(TargetKeys::data(cast.id, shared))
        .cmd("srem").arg(TargetKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(TargetKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a target
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this target had
/// * `cast` - The target being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &Target,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(TargetKeys::names(shared)).arg(old)
        .cmd("hset").arg(TargetKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different target
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The target id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::targets::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> =
        query!(cmd("hget").arg(TargetKeys::names(shared)).arg(name), shared).await?;
    Ok(owner.is_some_and(|owner| owner != id))
}
