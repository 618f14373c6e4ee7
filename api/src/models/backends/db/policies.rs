//! Stores policies in the redis backend

use bb8_redis::redis::cmd;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

use super::keys::PolicyKeys;
use crate::models::Policy;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a policy
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a policy
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Policy, ApiError> {
    if raw.is_empty() {
        return not_found!("policy not found".to_owned());
    }
    let policy = Policy {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        comment: super::helpers::extract_opt(&mut raw, "comment"),
        custom_header: super::helpers::extract_opt(&mut raw, "custom_header"),
        edited: super::helpers::extract_bool_default(&mut raw, "edited", false)?,
        terms: deserialize_ext!(raw, "terms"),
        targets: deserialize_ext!(raw, "targets"),
        // test links live on the tests themselves and are filled on reads
        tests: Vec::new(),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(policy)
}

/// Builds a pipeline that saves a policies data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The policy to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Policy,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = PolicyKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("edited").arg(cast.edited)
        .cmd("hset").arg(&data).arg("terms").arg(serialize!(&cast.terms))
        .cmd("hset").arg(&data).arg("targets").arg(serialize!(&cast.targets))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(PolicyKeys::set(shared)).arg(cast.id);
    // optional fields are dropped from the hash when unset
    let pipe = match &cast.comment {
        Some(comment) => pipe.cmd("hset").arg(&data).arg("comment").arg(comment),
        None => pipe.cmd("hdel").arg(&data).arg("comment"),
    };
    let pipe = match &cast.custom_header {
        Some(header) => pipe.cmd("hset").arg(&data).arg("custom_header").arg(header),
        None => pipe.cmd("hdel").arg(&data).arg("custom_header"),
    };
    Ok(pipe)
}

/// Creates a policy in redis
///
/// # Arguments
///
/// * `cast` - The policy to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policies::create", skip_all, err(Debug))]
pub async fn create(cast: Policy, shared: &Shared) -> Result<Policy, ApiError> {
    // claim this policies name or bail on a conflict
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(PolicyKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("policy {} already exists", cast.name));
    }
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a policy from redis
///
/// # Arguments
///
/// * `id` - The id of the policy to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policies::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Policy, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(PolicyKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every policy from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policies::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Policy>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(PolicyKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(PolicyKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Check whether a set of policies exist in redis
///
/// # Arguments
///
/// * `ids` - The policy ids to check
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policies::exists", skip(shared), err(Debug))]
pub async fn exists(ids: &[i64], shared: &Shared) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let key = PolicyKeys::set(shared);
    let checks: Vec<bool> = ids
        .iter()
        .fold(redis::pipe().atomic(), |pipe, id| {
            pipe.cmd("sismember").arg(&key).arg(id)
        })
        .query_async(conn!(shared))
        .await?;
    if checks.iter().any(|check| !check) {
        return not_found!(format!("{ids:?} must all be valid policies"));
    }
    Ok(())
}

/// Builds a pipeline that removes a policy from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The policy to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Policy,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(PolicyKeys::data(cast.id, shared))
        .cmd("srem").arg(PolicyKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(PolicyKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a policy
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this policy had
/// * `cast` - The policy being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &Policy,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(PolicyKeys::names(shared)).arg(old)
        .cmd("hset").arg(PolicyKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different policy
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The policy id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policies::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> =
        query!(cmd("hget").arg(PolicyKeys::names(shared)).arg(name), shared).await?;
    Ok(owner.is_some_and(|owner| owner != id))
}

/// Builds the pipeline commands flagging policies as edited
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `ids` - The policies to flag
/// * `shared` - Shared aclforge objects
pub fn build_mark_edited<'a>(
    pipe: &'a mut redis::Pipeline,
    ids: &HashSet<i64>,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    ids.iter().fold(pipe, |pipe, id| {
        pipe.cmd("hset")
            .arg(PolicyKeys::data(*id, shared))
            .arg("edited")
            .arg(true)
    })
}

/// Clear the edited flag on a policy
///
/// # Arguments
///
/// * `id` - The policy to clear
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policies::clear_edited", skip(shared), err(Debug))]
pub async fn clear_edited(id: i64, shared: &Shared) -> Result<(), ApiError> {
    let _: () = query!(
        cmd("hset")
            .arg(PolicyKeys::data(id, shared))
            .arg("edited")
            .arg(false),
        shared
    )
    .await?;
    Ok(())
}
