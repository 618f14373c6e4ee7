//! Stores dynamic policies in the redis backend

use bb8_redis::redis::cmd;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

use super::keys::DynamicPolicyKeys;
use crate::models::DynamicPolicy;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, deserialize_opt, extract, not_found, query, serialize};

/// Cast a redis hashmap into a dynamic policy
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a dynamic policy
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<DynamicPolicy, ApiError> {
    if raw.is_empty() {
        return not_found!("dynamic policy not found".to_owned());
    }
    let dynamic = DynamicPolicy {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        comment: super::helpers::extract_opt(&mut raw, "comment"),
        filter_action: deserialize_opt!(raw, "filter_action"),
        default_action: deserialize_opt!(raw, "default_action"),
        source_filters: deserialize_ext!(raw, "source_filters"),
        destination_filters: deserialize_ext!(raw, "destination_filters"),
        policy_filters: deserialize_ext!(raw, "policy_filters"),
        targets: deserialize_ext!(raw, "targets"),
        // test links live on the tests themselves and are filled on reads
        tests: Vec::new(),
        edited: super::helpers::extract_bool_default(&mut raw, "edited", false)?,
        created: deserialize_ext!(raw, "created"),
    };
    Ok(dynamic)
}

/// Builds a pipeline that saves a dynamic policies data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The dynamic policy to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &DynamicPolicy,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = DynamicPolicyKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("edited").arg(cast.edited)
        .cmd("hset").arg(&data).arg("source_filters").arg(serialize!(&cast.source_filters))
        .cmd("hset").arg(&data).arg("destination_filters").arg(serialize!(&cast.destination_filters))
        .cmd("hset").arg(&data).arg("policy_filters").arg(serialize!(&cast.policy_filters))
        .cmd("hset").arg(&data).arg("targets").arg(serialize!(&cast.targets))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(DynamicPolicyKeys::set(shared)).arg(cast.id);
    // optional fields are dropped from the hash when unset
    let pipe = match &cast.comment {
        Some(comment) => pipe.cmd("hset").arg(&data).arg("comment").arg(comment),
        None => pipe.cmd("hdel").arg(&data).arg("comment"),
    };
    let pipe = match &cast.filter_action {
        Some(action) => pipe.cmd("hset").arg(&data).arg("filter_action").arg(serialize!(action)),
        None => pipe.cmd("hdel").arg(&data).arg("filter_action"),
    };
    let pipe = match &cast.default_action {
        Some(action) => pipe.cmd("hset").arg(&data).arg("default_action").arg(serialize!(action)),
        None => pipe.cmd("hdel").arg(&data).arg("default_action"),
    };
    Ok(pipe)
}

/// Creates a dynamic policy in redis
///
/// # Arguments
///
/// * `cast` - The dynamic policy to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::dynamic_policies::create", skip_all, err(Debug))]
pub async fn create(cast: DynamicPolicy, shared: &Shared) -> Result<DynamicPolicy, ApiError> {
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(DynamicPolicyKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("dynamic policy {} already exists", cast.name));
    }
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a dynamic policy from redis
///
/// # Arguments
///
/// * `id` - The id of the dynamic policy to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::dynamic_policies::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<DynamicPolicy, ApiError> {
    let raw: HashMap<String, String> = query!(
        cmd("hgetall").arg(DynamicPolicyKeys::data(id, shared)),
        shared
    )
    .await?;
    cast(raw)
}

/// Gets every dynamic policy from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::dynamic_policies::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<DynamicPolicy>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(DynamicPolicyKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(DynamicPolicyKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Builds a pipeline that removes a dynamic policy from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The dynamic policy to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &DynamicPolicy,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(DynamicPolicyKeys::data(cast.id, shared))
        .cmd("srem").arg(DynamicPolicyKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(DynamicPolicyKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a dynamic policy
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this dynamic policy had
/// * `cast` - The dynamic policy being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &DynamicPolicy,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(DynamicPolicyKeys::names(shared)).arg(old)
        .cmd("hset").arg(DynamicPolicyKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different dynamic policy
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The dynamic policy id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::dynamic_policies::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> = query!(
        cmd("hget").arg(DynamicPolicyKeys::names(shared)).arg(name),
        shared
    )
    .await?;
    Ok(owner.is_some_and(|owner| owner != id))
}

/// Builds the pipeline commands flagging dynamic policies as edited
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `ids` - The dynamic policies to flag
/// * `shared` - Shared aclforge objects
pub fn build_mark_edited<'a>(
    pipe: &'a mut redis::Pipeline,
    ids: &HashSet<i64>,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    ids.iter().fold(pipe, |pipe, id| {
        pipe.cmd("hset")
            .arg(DynamicPolicyKeys::data(*id, shared))
            .arg("edited")
            .arg(true)
    })
}

/// Clear the edited flag on a dynamic policy
///
/// # Arguments
///
/// * `id` - The dynamic policy to clear
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::dynamic_policies::clear_edited", skip(shared), err(Debug))]
pub async fn clear_edited(id: i64, shared: &Shared) -> Result<(), ApiError> {
    let _: () = query!(
        cmd("hset")
            .arg(DynamicPolicyKeys::data(id, shared))
            .arg("edited")
            .arg(false),
        shared
    )
    .await?;
    Ok(())
}
