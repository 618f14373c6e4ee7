//! Wrappers for interacting with revisions within aclforge
//!
//! Revisions snapshot a policy and its rendered per target configs behind
//! the coverage gate. Snapshots are frozen at creation and never rewritten.

use chrono::Utc;
use tracing::instrument;

use super::db;
use crate::compile::{self, check, resolve};
use crate::models::{
    paginate, DeployJob, DeployReceipt, Deployment, DeploymentStatus, ListParams, Page,
    PolicyTest, Revision, RevisionConfig, RevisionRequest, RevisionSource,
};
use crate::utils::{ApiError, Shared};
use crate::{conn, forbidden, not_found};

impl Revision {
    /// Run the coverage gate and snapshot a policy into a revision
    ///
    /// # Arguments
    ///
    /// * `req` - The revision create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Revision::create", skip_all, err(Debug))]
    pub async fn create(req: RevisionRequest, shared: &Shared) -> Result<Revision, ApiError> {
        let source = req.source()?;
        // the gate requires every enabled term to be covered by a passing test
        let report = match source {
            RevisionSource::Policy { policy_id } => {
                PolicyTest::run(Some(policy_id), None, shared).await?
            }
            RevisionSource::DynamicPolicy { dynamic_policy_id } => {
                PolicyTest::run(None, Some(dynamic_policy_id), shared).await?
            }
        };
        if report.coverage < 1.0 {
            return forbidden!(check::coverage_message(report.coverage));
        }
        let catalog = super::catalog(shared).await?;
        // freeze the policy snapshot and its expanded terms
        let (json_data, terms, comment, custom_header, name, targets, default_action) =
            match source {
                RevisionSource::Policy { policy_id } => {
                    let policy = match catalog.policies.get(&policy_id) {
                        Some(policy) => policy,
                        None => return not_found!("Policy not found".to_owned()),
                    };
                    let terms = compile::expand::expand(policy, &catalog)?;
                    (
                        serde_json::to_value(policy)?,
                        terms,
                        policy.comment.clone(),
                        policy.custom_header.clone(),
                        policy.name.clone(),
                        policy.targets.clone(),
                        None,
                    )
                }
                RevisionSource::DynamicPolicy { dynamic_policy_id } => {
                    let dynamic = db::dynamic_policies::get(dynamic_policy_id, shared).await?;
                    let terms = resolve::resolve(&catalog, &dynamic)?;
                    if terms.is_empty() {
                        return forbidden!("No terms found for dynamic policy".to_owned());
                    }
                    (
                        serde_json::to_value(&dynamic)?,
                        terms,
                        dynamic.comment.clone(),
                        None,
                        dynamic.name.clone(),
                        dynamic.targets.clone(),
                        dynamic.default_action,
                    )
                }
            };
        // render one config per associated target in target id order
        let mut target_ids = targets;
        target_ids.sort_unstable();
        let mut configs = Vec::with_capacity(target_ids.len());
        for target_id in target_ids {
            let target = db::targets::get(target_id, shared).await?;
            let compiled = compile::generate(
                &catalog,
                &name,
                comment.as_deref(),
                custom_header.as_deref(),
                &terms,
                &target,
                default_action,
            )?;
            configs.push(RevisionConfig {
                target_id,
                filter_name: compiled.filter_name,
                filename: compiled.filename,
                config: compiled.config,
            });
        }
        let id = db::ids::next("revisions", shared).await?;
        let cast = Revision {
            id,
            comment: req.comment,
            source,
            json_data,
            expanded_terms: serde_json::to_value(&terms)?,
            configs,
            created: Utc::now(),
        };
        let cast = db::revisions::create(cast, shared).await?;
        // a fresh revision clears the edited flag on its source
        match source {
            RevisionSource::Policy { policy_id } => {
                db::policies::clear_edited(policy_id, shared).await?;
            }
            RevisionSource::DynamicPolicy { dynamic_policy_id } => {
                db::dynamic_policies::clear_edited(dynamic_policy_id, shared).await?;
            }
        }
        Ok(cast)
    }

    /// Get a revision by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the revision to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Revision::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Revision, ApiError> {
        db::revisions::get(id, shared).await
    }

    /// List revisions
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Revision::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Revision>, ApiError> {
        let revisions = db::revisions::list_all(shared).await?;
        paginate(revisions, &params)
    }

    /// Delete a revision and its deployments
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the revision to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Revision::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        // make sure this revision exists
        db::revisions::get(id, shared).await?;
        let mut pipe = redis::pipe();
        let deployments = db::deployments::list_all(shared).await?;
        for deployment in deployments {
            if deployment.revision_id == id {
                db::deployments::build_delete(&mut pipe, deployment.id, shared);
            }
        }
        db::revisions::build_delete(&mut pipe, id, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }

    /// Get the stored config text for one target verbatim
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the revision to read
    /// * `target_id` - The target whose config to read
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Revision::raw_config", skip(shared), err(Debug))]
    pub async fn raw_config(id: i64, target_id: i64, shared: &Shared) -> Result<String, ApiError> {
        let revision = db::revisions::get(id, shared).await?;
        match revision
            .configs
            .into_iter()
            .find(|config| config.target_id == target_id)
        {
            Some(config) => Ok(config.config),
            None => not_found!("RevisionConfig not found".to_owned()),
        }
    }

    /// Queue one deploy job per deployer bound to this revisions targets
    ///
    /// Jobs are enqueued in target id order. When no deployer matches any
    /// target the deploy fails with a 404.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the revision to deploy
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Revision::deploy", skip(shared), err(Debug))]
    pub async fn deploy(id: i64, shared: &Shared) -> Result<DeployReceipt, ApiError> {
        let revision = db::revisions::get(id, shared).await?;
        let deployers = db::deployers::list_all(shared).await?;
        // configs are stored in target id order already
        let mut jobs = Vec::new();
        let mut deployment_ids = Vec::new();
        for config in &revision.configs {
            for deployer in deployers
                .iter()
                .filter(|deployer| deployer.target_id == config.target_id)
            {
                // record the attempt before handing it to a worker
                let deployment_id = db::ids::next("deployments", shared).await?;
                let deployment = Deployment {
                    id: deployment_id,
                    deployer_id: deployer.id,
                    revision_id: revision.id,
                    status: DeploymentStatus::Pending,
                    output: None,
                    created: Utc::now(),
                };
                let mut pipe = redis::pipe();
                db::deployments::build(&mut pipe, &deployment, shared)?;
                let _: () = pipe.atomic().query_async(conn!(shared)).await?;
                jobs.push(DeployJob {
                    deployment_id,
                    revision_id: revision.id,
                    deployer_id: deployer.id,
                    mode: deployer.mode,
                });
                deployment_ids.push(deployment_id);
            }
        }
        if deployment_ids.is_empty() {
            return not_found!("No associated deployers found for this revision".to_owned());
        }
        db::queue::enqueue(&jobs, shared).await?;
        Ok(DeployReceipt {
            message: "Deploy started".to_owned(),
            deployment_ids,
        })
    }
}
