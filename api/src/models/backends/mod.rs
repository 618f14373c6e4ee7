//! Wrappers for interacting with aclforge objects in the redis backend

pub mod db;
mod deployers;
mod deployments;
mod dynamic_policies;
pub mod events;
mod networks;
mod policies;
mod policy_tests;
mod revisions;
mod services;
pub mod setup;
mod targets;
mod users;

use crate::compile::Catalog;
use crate::utils::{ApiError, Shared};

/// Load a full in memory snapshot of the authored objects
///
/// # Arguments
///
/// * `shared` - Shared aclforge objects
pub async fn catalog(shared: &Shared) -> Result<Catalog, ApiError> {
    let (networks, services, policies) = futures::try_join!(
        db::networks::list_all(shared),
        db::services::list_all(shared),
        db::policies::list_all(shared),
    )?;
    Ok(Catalog::new(networks, services, policies))
}
