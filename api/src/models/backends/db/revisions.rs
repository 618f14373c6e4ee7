//! Stores revisions and their frozen configs in the redis backend

use bb8_redis::redis::cmd;
use std::collections::HashMap;
use tracing::instrument;

use super::keys::RevisionKeys;
use crate::models::Revision;
use crate::utils::{ApiError, Shared};
use crate::{conn, deserialize_ext, extract, not_found, query, serialize};

/// Cast a redis hashmap into a revision
///
/// # Arguments
///
/// * `raw` - The hashmap to cast to a revision
pub(super) fn cast(mut raw: HashMap<String, String>) -> Result<Revision, ApiError> {
    if raw.is_empty() {
        return not_found!("revision not found".to_owned());
    }
    let revision = Revision {
        id: extract!(raw, "id").parse::<i64>()?,
        comment: super::helpers::extract_opt(&mut raw, "comment"),
        source: deserialize_ext!(raw, "source"),
        json_data: deserialize_ext!(raw, "json_data"),
        expanded_terms: deserialize_ext!(raw, "expanded_terms"),
        configs: deserialize_ext!(raw, "configs"),
        created: deserialize_ext!(raw, "created"),
    };
    Ok(revision)
}

/// Builds a pipeline that saves a revisions data hash
///
/// The snapshots are serialized once at creation and never rewritten.
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `cast` - The revision to save
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build<'a>(
    pipe: &'a mut redis::Pipeline,
    cast: &Revision,
    shared: &Shared,
) -> Result<&'a mut redis::Pipeline, ApiError> {
    let data = RevisionKeys::data(cast.id, shared);
    let pipe = pipe
        .cmd("hsetnx").arg(&data).arg("id").arg(cast.id)
        .cmd("hsetnx").arg(&data).arg("source").arg(serialize!(&cast.source))
        .cmd("hsetnx").arg(&data).arg("json_data").arg(serialize!(&cast.json_data))
        .cmd("hsetnx").arg(&data).arg("expanded_terms").arg(serialize!(&cast.expanded_terms))
        .cmd("hsetnx").arg(&data).arg("configs").arg(serialize!(&cast.configs))
        .cmd("hsetnx").arg(&data).arg("created").arg(serialize!(&cast.created))
        .cmd("sadd").arg(RevisionKeys::set(shared)).arg(cast.id);
    let pipe = match &cast.comment {
        Some(comment) => pipe.cmd("hsetnx").arg(&data).arg("comment").arg(comment),
        None => pipe,
    };
    Ok(pipe)
}

/// Creates a revision in redis
///
/// # Arguments
///
/// * `cast` - The revision to create
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::revisions::create", skip_all, err(Debug))]
pub async fn create(cast: Revision, shared: &Shared) -> Result<Revision, ApiError> {
    let mut pipe = redis::pipe();
    build(&mut pipe, &cast, shared)?;
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(cast)
}

/// Gets a revision from redis
///
/// # Arguments
///
/// * `id` - The id of the revision to get
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::revisions::get", skip(shared), err(Debug))]
pub async fn get(id: i64, shared: &Shared) -> Result<Revision, ApiError> {
    let raw: HashMap<String, String> =
        query!(cmd("hgetall").arg(RevisionKeys::data(id, shared)), shared).await?;
    cast(raw)
}

/// Gets every revision from redis
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::revisions::list_all", skip_all, err(Debug))]
pub async fn list_all(shared: &Shared) -> Result<Vec<Revision>, ApiError> {
    let ids: Vec<i64> = query!(cmd("smembers").arg(RevisionKeys::set(shared)), shared).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    ids.iter().fold(&mut pipe, |pipe, id| {
        pipe.cmd("hgetall").arg(RevisionKeys::data(*id, shared))
    });
    let raw: Vec<HashMap<String, String>> = pipe.query_async(conn!(shared)).await?;
    raw.into_iter().map(cast).collect()
}

/// Builds a pipeline that removes a revision from redis
///
/// # Arguments
///
/// * `pipe` - The redis pipeline to add onto
/// * `id` - The revision to delete
/// * `shared` - Shared aclforge objects
#[rustfmt::skip]
pub fn build_delete<'a>(
    pipe: &'a mut redis::Pipeline,
    id: i64,
    shared: &Shared,
) -> &'a mut redis::Pipeline {
    pipe.cmd("del").arg(RevisionKeys::data(id, shared))
        .cmd("srem").arg(RevisionKeys::set(shared)).arg(id)
}
