//! Stores deployments in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::DeploymentKeys;
use crate::models::{Deployment, DeploymentStatus};
use crate::utils::{ApiError, Shared};
use crate::{conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a deployment
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a deployment
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Deployment, ApiError> {
    if raw.is_empty() {
        return not_found!("deployment not found".to_owned());
    }
    let deployment = Deployment {
        id: extract!(raw, "id").parse::<i64>()?,
        deployer_id: extract!(raw, "deployer_id").parse::<i64>()?,
        revision_id: extract!(raw, "revision_id").parse::<i64>()?,
        status: deserialize_ext!(raw, "status"),
        output: super::helpers::extract_opt(&mut raw, "output"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(deployment)
}

/// Builds a pipeline that saves a deployments data hash
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The deployment to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Deployment,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = DeploymentKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hset").arg(&data).arg("id").arg(cast.id)
        .cmd("hset").arg(&data).arg("deployer_id").arg(cast.deployer_id)
        .cmd("hset").arg(&data).arg("revision_id").arg(cast.revision_id)
        .cmd("hset").arg(&data).arg("status").arg(serialize!(&cast.status))
        .cmd("hset").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(DeploymentKeys::set(shared)).arg(cast.id);
    let pipe = match &cast.output {
        Some(output) => pipe.cmd("hset").arg(&data).arg("output").arg(output),
        None => pipe.cmd("hdel").arg(&data).arg("output"),
    };
    Ok(pipe)
}

/// Gets a deployment from redis
///
/// # Arguments
///
/// * `id` - The id of the deployment to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::deployments::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Deployment, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(DeploymentKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every deployment from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::deployments::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Deployment>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(DeploymentKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(DeploymentKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Update the status of a deployment
///
/// # Arguments
///
/// * `id` - The deployment to update
/// * `status` - The status to move it to
/// * `output` - The captured log to record if the job finished
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
#[instrument(name = "db::deployments::set_status", skip(output, shared), err(Debug))]
pub async fn set_status(
    id: i64,
    status: DeploymentStatus,
    output: Option<&str>,
    shared: &Shared,
) -> Result<(), ApiError> {
    let data = DeploymentKeys::data(id, shared);
    let mut pipe = redis::pipe();
    pipe.cmd("hset").arg(&data).arg("status").arg(serialize!(&status));
    if let Some(output) = output {
        pipe.cmd("hset").arg(&data).arg("output").arg(output);
    }
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(())
}

/// Builds a pipeline that removes a deployment from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `id` - The deployment to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    id: i64,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(DeploymentKeys::data(id, shared))
        .cmd("srem").arg(DeploymentKeys::set(shared)).arg(id)
}
