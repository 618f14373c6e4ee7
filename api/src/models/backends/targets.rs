//! Wrappers for interacting with targets within aclforge

use chrono::Utc;
use tracing::instrument;

use super::{db, events};
use crate::models::{paginate, ListParams, Page, Target, TargetRequest};
use crate::utils::{bounder, ApiError, Shared};
use crate::{conn, invalid};

impl Target {
    /// Validate and apply a request onto a target shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this target owns
    /// * `req` - The request to apply
    fn from_request(id: i64, req: TargetRequest) -> Result<Target, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        Ok(Target {
            id,
            name: req.name,
            generator: req.generator,
            inet_mode: req.inet_mode,
            substitutions: req.substitutions,
            created: Utc::now(),
        })
    }

    /// Create a target
    ///
    /// # Arguments
    ///
    /// * `req` - The target create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Target::create", skip_all, err(Debug))]
    pub async fn create(req: TargetRequest, shared: &Shared) -> Result<Target, ApiError> {
        let id = db::ids::next("targets", shared).await?;
        let cast = Target::from_request(id, req)?;
        db::targets::create(cast, shared).await
    }

    /// Get a target by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the target to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Target::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Target, ApiError> {
        db::targets::get(id, shared).await
    }

    /// List targets
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Target::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Target>, ApiError> {
        let targets = db::targets::list_all(shared).await?;
        paginate(targets, &params)
    }

    /// Replace a target and propagate the edit
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the target to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Target::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(id: i64, req: TargetRequest, shared: &Shared) -> Result<Target, ApiError> {
        let old = db::targets::get(id, shared).await?;
        if req.name != old.name && db::targets::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A target with this name already exists");
        }
        let mut cast = Target::from_request(id, req)?;
        cast.created = old.created;
        // flag every policy compiled for this target
        let policies = db::policies::list_all(shared).await?;
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        let touched = events::target_touched(&policies, &dynamics, id);
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::targets::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::targets::build(&mut pipe, &cast, shared)?;
        db::policies::build_mark_edited(&mut pipe, &touched.policies, shared);
        db::dynamic_policies::build_mark_edited(&mut pipe, &touched.dynamic_policies, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(cast)
    }

    /// Delete a target
    ///
    /// Policy bindings are stripped, the owning policies are flagged as
    /// edited and deployers bound to this target are cascade deleted.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the target to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Target::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::targets::get(id, shared).await?;
        let mut pipe = redis::pipe();
        // strip this target from any policies
        let policies = db::policies::list_all(shared).await?;
        for mut policy in policies {
            if policy.targets.contains(&id) {
                policy.targets.retain(|tid| *tid != id);
                policy.edited = true;
                db::policies::build(&mut pipe, &policy, shared)?;
            }
        }
        // strip this target from any dynamic policies
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        for mut dynamic in dynamics {
            if dynamic.targets.contains(&id) {
                dynamic.targets.retain(|tid| *tid != id);
                dynamic.edited = true;
                db::dynamic_policies::build(&mut pipe, &dynamic, shared)?;
            }
        }
        // deployers bound to this target go with it
        let deployers = db::deployers::list_all(shared).await?;
        for deployer in deployers {
            if deployer.target_id == id {
                db::deployers::build_delete(&mut pipe, &deployer, shared);
            }
        }
        db::targets::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }
}
