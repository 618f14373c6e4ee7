//! Stores services in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::ServiceKeys;
use crate::models::Service;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a service
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a service
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Service, ApiError> {
    if raw.is_empty() {
        return not_found!("service not found".to_owned());
    }
    let service = Service {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        entries: deserialize_ext!(raw, "entries"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(service)
}

/// Builds a pipeline that saves a services data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The service to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Service,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = ServiceKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("entries").arg(serialize!(&cast.entries))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(ServiceKeys::set(shared)).arg(cast.id);
    Ok(pipe)
}

/// Creates a service in redis
///
/// # Arguments
///
/// * `cast` - The service to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::services::create", skip_all, err(Debug))]
pub async fn create(cast: Service, shared: &Shared) -> Result<Service, ApiError> {
    // claim this services name or bail on a conflict
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(ServiceKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("service {} already exists", cast.name));
    }
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a service from redis
///
/// # Arguments
///
/// * `id` - The id of the service to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::services::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Service, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(ServiceKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every service from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::services::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Service>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(ServiceKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(ServiceKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Check whether a set of services exist in redis
///
/// # Arguments
///
/// * `ids` - The service ids to check
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::services::exists", skip(shared), err(Debug))]
pub async fn exists(ids: &[i64], shared: &Shared) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let key = ServiceKeys::set(shared);
    let checks: Vec<bool> = ids
        .iter()
        .fold(redis::pipe().atomic(), |pipe, id| {
            pipe.cmd("sismember").arg(&key).arg(id)
        })
        .query_async(conn!(shared))
        .await?;
    if checks.iter().any(|check| !check) {
        return not_found!(format!("{ids:?} must all be valid services"));
    }
    Ok(())
}

/// Builds a pipeline that removes a service from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The service to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Service,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(ServiceKeys::data(cast.id, shared))
        .cmd("srem").arg(ServiceKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(ServiceKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a service
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this service had
/// * `cast` - The service being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &Service,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(ServiceKeys::names(shared)).arg(old)
        .cmd("hset").arg(ServiceKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different service
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The service id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::services::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> =
        query!(cmd("hget").arg(ServiceKeys::names(shared)).arg(name), shared).await?;
    Ok(owner.is_some_and(|owner| owner != id))
}
