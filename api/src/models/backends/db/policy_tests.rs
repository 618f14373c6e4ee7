//! Stores policy tests in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::PolicyTestKeys;
use crate::models::PolicyTest;
use crate::utils::{ApiError, Shared};
use crate::{conflict, conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a policy test
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a policy test
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<PolicyTest, ApiError> {
    if raw.is_empty() {
        return not_found!("test not found".to_owned());
    }
    let test = PolicyTest {
        id: extract!(raw, "id").parse::<i64>()?,
        name: extract!(raw, "name"),
        comment: super::helpers::extract_opt(&mut raw, "comment"),
        policies: deserialize_ext!(raw, "policies"),
        dynamic_policies: deserialize_ext!(raw, "dynamic_policies"),
        cases: deserialize_ext!(raw, "cases"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(test)
}

/// Builds a pipeline that saves a policy tests data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The policy test to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &PolicyTest,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = PolicyTestKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("name").arg(&cast.name)
        .cmd("hset").arg(&data).arg("policies").arg(serialize!(&cast.policies))
        .cmd("hset").arg(&data).arg("dynamic_policies").arg(serialize!(&cast.dynamic_policies))
        .cmd("hset").arg(&data).arg("cases").arg(serialize!(&cast.cases))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(PolicyTestKeys::set(shared)).arg(cast.id);
    let pipe = match &cast.comment {
        Some(comment) => pipe.cmd("hset").arg(&data).arg("comment").arg(comment),
        None => pipe.cmd("hdel").arg(&data).arg("comment"),
    };
    Ok(pipe)
}

/// Creates a policy test in redis
///
/// # Arguments
///
/// * `cast` - The policy test to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policy_tests::create", skip_all, err(Debug))]
pub async fn create(cast: PolicyTest, shared: &Shared) -> Result<PolicyTest, ApiError> {
    let claimed: bool = query!(
        cmd("hsetnx")
            .arg(PolicyTestKeys::names(shared))
            .arg(&cast.name)
            .arg(cast.id),
        shared
    )
    .await?;
    if !claimed {
        return conflict!(format!("test {} already exists", cast.name));
    }
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a policy test from redis
///
/// # Arguments
///
/// * `id` - The id of the policy test to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policy_tests::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<PolicyTest, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(PolicyTestKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every policy test from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policy_tests::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<PolicyTest>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(PolicyTestKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(PolicyTestKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Builds a pipeline that removes a policy test from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The policy test to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &PolicyTest,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(PolicyTestKeys::data(cast.id, shared))
        .cmd("srem").arg(PolicyTestKeys::set(shared)).arg(cast.id)
        .cmd("hdel").arg(PolicyTestKeys::names(shared)).arg(&cast.name)
}

/// Builds the pipeline commands renaming a policy test
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `old` - The name this policy test had
/// * `cast` - The policy test being saved
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_rename<'a>(
    pipe: &'a mut redis::Pipeline,
    old: &str,
    cast: &PolicyTest,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("hdel").arg(PolicyTestKeys::names(shared)).arg(old)
        .cmd("hset").arg(PolicyTestKeys::names(shared)).arg(&cast.name).arg(cast.id)
}

/// Check whether a name is taken by a different policy test
///
/// # Arguments
///
/// * `name` - The name to check
/// * `id` - The policy test id the name may already belong to
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::policy_tests::name_taken", skip(shared), err(Debug))]
pub async fn name_taken(name: &str, id: i64, shared: &Shared) -> Result<bool, ApiError> {
    let owner: Option<i64> = query!(
        cmd("hget").arg(PolicyTestKeys::names(shared)).arg(name),
        shared
    )
    .await?;
    Ok(owner.is_some_and(|owner| owner != id))
}
