//! Wrappers for interacting with deployments within aclforge

use tracing::instrument;

use super::db;
use crate::models::{paginate, Deployment, ListParams, Page};
use crate::utils::{ApiError, Shared};

impl Deployment {
    /// Get a deployment by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the deployment to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployment::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Deployment, ApiError> {
        db::deployments::get(id, shared).await
    }

    /// List deployments
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployment::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Deployment>, ApiError> {
        let deployments = db::deployments::list_all(shared).await?;
        paginate(deployments, &params)
    }
}
