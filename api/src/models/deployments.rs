//! The structures for deployments and their queued jobs

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use super::DeployMode;

/// The lifecycle states of a deployment
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentStatus {
    /// The deployment is queued and waiting for a worker
    Pending,
    /// A worker is pushing this deployment
    Running,
    /// The deployment was pushed successfully
    Completed,
    /// The deployment failed
    Failed,
}

/// One attempt to push one revision config through one deployer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Deployment {
    /// The id of this deployment
    pub id: i64,
    /// The deployer pushing this deployment
    pub deployer_id: i64,
    /// The revision being pushed
    pub revision_id: i64,
    /// The current state of this deployment
    pub status: DeploymentStatus,
    /// The captured adaptor log for this deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// When this deployment was created
    pub created: DateTime<Utc>,
}

/// A queued deploy job handed to a worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DeployJob {
    /// The deployment this job updates
    pub deployment_id: i64,
    /// The revision to push
    pub revision_id: i64,
    /// The deployer to push with
    pub deployer_id: i64,
    /// The delivery mechanism to use
    pub mode: DeployMode,
}

/// The response to a deploy request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DeployReceipt {
    /// A human friendly status message
    pub message: String,
    /// The deployments that were created
    pub deployment_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_lowercase() {
        let raw = serde_json::to_string(&DeploymentStatus::Running).unwrap();
        assert_eq!(raw, "\"running\"");
        let parsed: DeploymentStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, DeploymentStatus::Failed);
    }

    #[test]
    fn jobs_round_trip_through_the_queue() {
        let job = DeployJob {
            deployment_id: 4,
            revision_id: 2,
            deployer_id: 9,
            mode: DeployMode::ProxmoxNft,
        };
        let raw = serde_json::to_string(&job).unwrap();
        let parsed: DeployJob = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, job);
    }
}
