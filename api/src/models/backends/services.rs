//! Wrappers for interacting with services within aclforge

use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;

use super::{db, events};
use crate::models::{
    paginate, ListParams, Page, Service, ServiceEntry, ServiceEntryKind, ServiceRequest,
    ServiceUsage,
};
use crate::utils::{bounder, ApiError, Shared};
use crate::{conn, forbidden, invalid};

/// Check whether one service can reach another through nested references
///
/// # Arguments
///
/// * `services` - All authored services by id
/// * `from` - The service to start from
/// * `to` - The service to look for
fn reaches(services: &HashMap<i64, &Service>, from: i64, to: i64) -> bool {
    let mut frontier = vec![from];
    let mut seen = std::collections::HashSet::new();
    while let Some(id) = frontier.pop() {
        if id == to {
            return true;
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(service) = services.get(&id) {
            frontier.extend(service.nested_ids());
        }
    }
    false
}

impl Service {
    /// Validate and apply a request onto a service shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this service owns
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    async fn from_request(
        id: i64,
        req: ServiceRequest,
        shared: &Shared,
    ) -> Result<Service, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        // validate the protocol/port pairing on every entry
        for entry in &req.entries {
            entry.validate()?;
        }
        // make sure any nested services exist and do not self reference
        let nested: Vec<i64> = req
            .entries
            .iter()
            .filter_map(ServiceEntryKind::nested_id)
            .collect();
        if nested.contains(&id) {
            return invalid!("entries", "a service cannot nest itself");
        }
        db::services::exists(&nested, shared).await?;
        // give every entry row its own id
        let start = db::ids::reserve("service_entries", req.entries.len() as i64, shared).await?;
        let entries = req
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| ServiceEntry {
                id: start + index as i64,
                entry,
            })
            .collect();
        Ok(Service {
            id,
            name: req.name,
            entries,
            created: Utc::now(),
        })
    }

    /// Create a service
    ///
    /// # Arguments
    ///
    /// * `req` - The service create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Service::create", skip_all, err(Debug))]
    pub async fn create(req: ServiceRequest, shared: &Shared) -> Result<Service, ApiError> {
        let id = db::ids::next("services", shared).await?;
        let cast = Service::from_request(id, req, shared).await?;
        db::services::create(cast, shared).await
    }

    /// Get a service by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the service to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Service::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Service, ApiError> {
        db::services::get(id, shared).await
    }

    /// List services
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Service::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Service>, ApiError> {
        let services = db::services::list_all(shared).await?;
        paginate(services, &params)
    }

    /// Replace a service and propagate the edit
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the service to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Service::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(id: i64, req: ServiceRequest, shared: &Shared) -> Result<Service, ApiError> {
        let old = db::services::get(id, shared).await?;
        if req.name != old.name && db::services::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A service with this name already exists");
        }
        let mut cast = Service::from_request(id, req, shared).await?;
        cast.created = old.created;
        // adding a nested reference that reaches back here would be a cycle
        let all = db::services::list_all(shared).await?;
        let by_id: HashMap<i64, &Service> = all.iter().map(|service| (service.id, service)).collect();
        for nested in cast.nested_ids() {
            if reaches(&by_id, nested, id) {
                return invalid!(
                    "entries",
                    format!("nesting service {nested} would create a cycle")
                );
            }
        }
        let services = db::services::list_all(shared).await?;
        let policies = db::policies::list_all(shared).await?;
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        let touched = events::service_touched(&services, &policies, &dynamics, id);
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::services::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::services::build(&mut pipe, &cast, shared)?;
        db::policies::build_mark_edited(&mut pipe, &touched.policies, shared);
        db::dynamic_policies::build_mark_edited(&mut pipe, &touched.dynamic_policies, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(cast)
    }

    /// Delete a service
    ///
    /// Services still nested by other services cannot be deleted. Term
    /// references are stripped like cascade deleted link rows and the owning
    /// policies are flagged as edited.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the service to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Service::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::services::get(id, shared).await?;
        let all = db::services::list_all(shared).await?;
        if all.iter().any(|service| service.nested_ids().contains(&id)) {
            return forbidden!("Cannot delete a service that is nested by another service".to_owned());
        }
        let mut pipe = redis::pipe();
        // strip this service out of any policy terms
        let policies = db::policies::list_all(shared).await?;
        for mut policy in policies {
            let mut stripped = false;
            for term in &mut policy.terms {
                if let crate::models::TermBody::Filter(filter) = &mut term.body {
                    let before = filter.source_services.len() + filter.destination_services.len();
                    filter.source_services.retain(|sid| *sid != id);
                    filter.destination_services.retain(|sid| *sid != id);
                    if filter.source_services.len() + filter.destination_services.len() != before {
                        stripped = true;
                    }
                }
            }
            if stripped {
                policy.edited = true;
                db::policies::build(&mut pipe, &policy, shared)?;
            }
        }
        db::services::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }

    /// Get the objects referencing a service
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the service to look up
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Service::usage", skip(shared), err(Debug))]
    pub async fn usage(id: i64, shared: &Shared) -> Result<ServiceUsage, ApiError> {
        db::services::get(id, shared).await?;
        let policies = db::policies::list_all(shared).await?;
        let services = db::services::list_all(shared).await?;
        let mut usage = ServiceUsage {
            policies: policies
                .iter()
                .filter(|policy| {
                    policy.terms.iter().any(|term| {
                        term.body.filter().is_some_and(|filter| {
                            filter.source_services.contains(&id)
                                || filter.destination_services.contains(&id)
                        })
                    })
                })
                .map(|policy| policy.id)
                .collect(),
            services: services
                .iter()
                .filter(|service| service.nested_ids().contains(&id))
                .map(|service| service.id)
                .collect(),
        };
        usage.policies.sort_unstable();
        usage.services.sort_unstable();
        Ok(usage)
    }
}
