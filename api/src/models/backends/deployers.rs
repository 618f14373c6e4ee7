//! Wrappers for interacting with deployers within aclforge

use chrono::Utc;
use tracing::instrument;

use super::db;
use crate::models::{paginate, Deployer, DeployerRequest, ListParams, Page};
use crate::utils::{bounder, ApiError, Shared};
use crate::{conn, invalid};

impl Deployer {
    /// Validate and apply a request onto a deployer shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this deployer owns
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    async fn from_request(
        id: i64,
        req: DeployerRequest,
        shared: &Shared,
    ) -> Result<Deployer, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        // the config block must agree with the declared mode
        req.validate()?;
        // make sure the bound target exists
        db::targets::get(req.target_id, shared).await?;
        Ok(Deployer {
            id,
            name: req.name,
            mode: req.mode,
            target_id: req.target_id,
            config: req.config,
            created: Utc::now(),
        })
    }

    /// Create a deployer
    ///
    /// # Arguments
    ///
    /// * `req` - The deployer create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployer::create", skip_all, err(Debug))]
    pub async fn create(req: DeployerRequest, shared: &Shared) -> Result<Deployer, ApiError> {
        let id = db::ids::next("deployers", shared).await?;
        let cast = Deployer::from_request(id, req, shared).await?;
        db::deployers::create(cast, shared).await
    }

    /// Get a deployer by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the deployer to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployer::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Deployer, ApiError> {
        db::deployers::get(id, shared).await
    }

    /// List deployers
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployer::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Deployer>, ApiError> {
        let deployers = db::deployers::list_all(shared).await?;
        paginate(deployers, &params)
    }

    /// Replace a deployer
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the deployer to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployer::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(id: i64, req: DeployerRequest, shared: &Shared) -> Result<Deployer, ApiError> {
        let old = db::deployers::get(id, shared).await?;
        if req.name != old.name && db::deployers::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A deployer with this name already exists");
        }
        let mut cast = Deployer::from_request(id, req, shared).await?;
        cast.created = old.created;
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::deployers::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::deployers::build(&mut pipe, &cast, shared)?;
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(cast)
    }

    /// Delete a deployer
    ///
    /// Past deployments keep their deployer id as a historical record.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the deployer to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Deployer::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::deployers::get(id, shared).await?;
        let mut pipe = redis::pipe();
        db::deployers::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }
}
