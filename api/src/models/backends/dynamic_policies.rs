//! Wrappers for interacting with dynamic policies within aclforge

use chrono::Utc;
use tracing::instrument;

use super::db;
use crate::models::{paginate, DynamicPolicy, DynamicPolicyRequest, ListParams, Page};
use crate::utils::{bounder, ApiError, Shared};
use crate::{conn, invalid};

/// Fill the test links for a batch of dynamic policies
///
/// # Arguments
///
/// * `dynamics` - The dynamic policies to fill
/// * `shared` - Shared aclforge objects
async fn fill_tests(dynamics: &mut [DynamicPolicy], shared: &Shared) -> Result<(), ApiError> {
    let tests = db::policy_tests::list_all(shared).await?;
    for dynamic in dynamics {
        dynamic.tests = tests
            .iter()
            .filter(|test| test.dynamic_policies.contains(&dynamic.id))
            .map(|test| test.id)
            .collect();
        dynamic.tests.sort_unstable();
    }
    Ok(())
}

impl DynamicPolicy {
    /// Validate and apply a request onto a dynamic policy shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this dynamic policy owns
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    async fn from_request(
        id: i64,
        req: DynamicPolicyRequest,
        shared: &Shared,
    ) -> Result<DynamicPolicy, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        // make sure everything the filters reference exists
        db::networks::exists(&req.source_filters, shared).await?;
        db::networks::exists(&req.destination_filters, shared).await?;
        db::policies::exists(&req.policy_filters, shared).await?;
        db::targets::exists(&req.targets, shared).await?;
        Ok(DynamicPolicy {
            id,
            name: req.name,
            comment: req.comment,
            filter_action: req.filter_action,
            default_action: req.default_action,
            source_filters: req.source_filters,
            destination_filters: req.destination_filters,
            policy_filters: req.policy_filters,
            targets: req.targets,
            tests: Vec::new(),
            edited: false,
            created: Utc::now(),
        })
    }

    /// Create a dynamic policy
    ///
    /// # Arguments
    ///
    /// * `req` - The dynamic policy create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "DynamicPolicy::create", skip_all, err(Debug))]
    pub async fn create(
        req: DynamicPolicyRequest,
        shared: &Shared,
    ) -> Result<DynamicPolicy, ApiError> {
        let id = db::ids::next("dynamic_policies", shared).await?;
        let cast = DynamicPolicy::from_request(id, req, shared).await?;
        db::dynamic_policies::create(cast, shared).await
    }

    /// Get a dynamic policy by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the dynamic policy to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "DynamicPolicy::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<DynamicPolicy, ApiError> {
        let mut dynamic = db::dynamic_policies::get(id, shared).await?;
        fill_tests(std::slice::from_mut(&mut dynamic), shared).await?;
        Ok(dynamic)
    }

    /// List dynamic policies
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "DynamicPolicy::list", skip(shared), err(Debug))]
    pub async fn list(
        params: ListParams,
        shared: &Shared,
    ) -> Result<Page<DynamicPolicy>, ApiError> {
        let mut dynamics = db::dynamic_policies::list_all(shared).await?;
        fill_tests(&mut dynamics, shared).await?;
        paginate(dynamics, &params)
    }

    /// Replace a dynamic policy
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the dynamic policy to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "DynamicPolicy::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(
        id: i64,
        req: DynamicPolicyRequest,
        shared: &Shared,
    ) -> Result<DynamicPolicy, ApiError> {
        let old = db::dynamic_policies::get(id, shared).await?;
        if req.name != old.name && db::dynamic_policies::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A dynamic policy with this name already exists");
        }
        let mut cast = DynamicPolicy::from_request(id, req, shared).await?;
        cast.created = old.created;
        // the dynamic policy changed since its last revision
        cast.edited = true;
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::dynamic_policies::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::dynamic_policies::build(&mut pipe, &cast, shared)?;
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        fill_tests(std::slice::from_mut(&mut cast), shared).await?;
        Ok(cast)
    }

    /// Delete a dynamic policy
    ///
    /// Revisions of this dynamic policy and their deployments are cascade
    /// deleted, and test references are stripped.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the dynamic policy to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "DynamicPolicy::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::dynamic_policies::get(id, shared).await?;
        let mut pipe = redis::pipe();
        // strip this dynamic policy out of any tests
        let tests = db::policy_tests::list_all(shared).await?;
        for mut test in tests {
            if test.dynamic_policies.contains(&id) {
                test.dynamic_policies.retain(|did| *did != id);
                db::policy_tests::build(&mut pipe, &test, shared)?;
            }
        }
        // cascade delete this dynamic policies revisions and their deployments
        let revisions = db::revisions::list_all(shared).await?;
        let deployments = db::deployments::list_all(shared).await?;
        for revision in revisions {
            let matches = revision.source
                == (crate::models::RevisionSource::DynamicPolicy {
                    dynamic_policy_id: id,
                });
            if matches {
                for deployment in &deployments {
                    if deployment.revision_id == revision.id {
                        db::deployments::build_delete(&mut pipe, deployment.id, shared);
                    }
                }
                db::revisions::build_delete(&mut pipe, revision.id, shared);
            }
        }
        db::dynamic_policies::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }
}
