//! The redis queue deploy jobs flow through

use bb8_redis::redis::cmd;
use tracing::instrument;

use super::keys::QueueKeys;
use crate::models::DeployJob;
use crate::utils::{ApiError, Shared};
use crate::{conn, deserialize, query, serialize};

/// Enqueue deploy jobs in order
///
/// # Arguments
///
/// * `jobs` - The jobs to enqueue
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::queue::enqueue", skip_all, fields(jobs = jobs.len()), err(Debug))]
pub async fn enqueue(jobs: &[DeployJob], shared: &Shared) -> Result<(), ApiError> {
    if jobs.is_empty() {
        return Ok(());
    }
    let key = QueueKeys::deploys(shared);
    // push jobs one rpush at a time so queue order matches job order
    let mut pipe = redis::pipe();
    for job in jobs {
        pipe.cmd("rpush").arg(&key).arg(serialize!(job));
    }
    let _: () = pipe.atomic().query_async(conn!(shared)).await?;
    Ok(())
}

/// Claim the next deploy job off the queue
///
/// Blocks up to the timeout. The pop is atomic so each job lands on exactly
/// one worker.
///
/// # Arguments
///
/// * `timeout` - How long to block waiting for a job in seconds
/// * `shared` - Shared aclforge objects
#[instrument(name = "db::queue::claim", skip(shared), err(Debug))]
pub async fn claim(timeout: u64, shared: &Shared) -> Result<Option<DeployJob>, ApiError> {
    let key = QueueKeys::deploys(shared);
    let popped: Option<(String, String)> =
        query!(cmd("blpop").arg(&key).arg(timeout), shared).await?;
    match popped {
        Some((_, raw)) => {
            let job: DeployJob = deserialize!(&raw);
            Ok(Some(job))
        }
        None => Ok(None),
    }
}
