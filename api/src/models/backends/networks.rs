//! Wrappers for interacting with networks within aclforge

use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;

use super::{db, events};
use crate::models::{
    paginate, ListParams, Network, NetworkAddress, NetworkEntry, NetworkRequest, NetworkUsage,
    Page,
};
use crate::utils::{bounder, ApiError, Shared};
use crate::{conn, forbidden, invalid};

/// Check whether one network can reach another through nested references
///
/// # Arguments
///
/// * `networks` - All authored networks by id
/// * `from` - The network to start from
/// * `to` - The network to look for
fn reaches(networks: &HashMap<i64, &Network>, from: i64, to: i64) -> bool {
    let mut frontier = vec![from];
    let mut seen = std::collections::HashSet::new();
    while let Some(id) = frontier.pop() {
        if id == to {
            return true;
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(network) = networks.get(&id) {
            frontier.extend(network.nested_ids());
        }
    }
    false
}

impl Network {
    /// Validate and apply a request onto a network shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this network owns
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    async fn from_request(
        id: i64,
        req: NetworkRequest,
        shared: &Shared,
    ) -> Result<Network, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        // make sure any nested networks exist and do not self reference
        let nested: Vec<i64> = req
            .addresses
            .iter()
            .filter_map(NetworkEntry::nested_id)
            .collect();
        if nested.contains(&id) {
            return invalid!("addresses", "a network cannot nest itself");
        }
        db::networks::exists(&nested, shared).await?;
        // give every address row its own id
        let start = db::ids::reserve("network_addresses", req.addresses.len() as i64, shared).await?;
        let addresses = req
            .addresses
            .into_iter()
            .enumerate()
            .map(|(index, entry)| NetworkAddress {
                id: start + index as i64,
                entry,
            })
            .collect();
        Ok(Network {
            id,
            name: req.name,
            addresses,
            created: Utc::now(),
        })
    }

    /// Create a network
    ///
    /// # Arguments
    ///
    /// * `req` - The network create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Network::create", skip_all, err(Debug))]
    pub async fn create(req: NetworkRequest, shared: &Shared) -> Result<Network, ApiError> {
        let id = db::ids::next("networks", shared).await?;
        let cast = Network::from_request(id, req, shared).await?;
        db::networks::create(cast, shared).await
    }

    /// Get a network by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the network to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Network::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Network, ApiError> {
        db::networks::get(id, shared).await
    }

    /// List networks
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Network::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Network>, ApiError> {
        let networks = db::networks::list_all(shared).await?;
        paginate(networks, &params)
    }

    /// Replace a network and propagate the edit
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the network to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Network::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(id: i64, req: NetworkRequest, shared: &Shared) -> Result<Network, ApiError> {
        // make sure this network exists before validating against it
        let old = db::networks::get(id, shared).await?;
        if req.name != old.name && db::networks::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A network with this name already exists");
        }
        let mut cast = Network::from_request(id, req, shared).await?;
        cast.created = old.created;
        // adding a nested reference that reaches back here would be a cycle
        let all = db::networks::list_all(shared).await?;
        let by_id: HashMap<i64, &Network> = all.iter().map(|network| (network.id, network)).collect();
        for nested in cast.nested_ids() {
            if reaches(&by_id, nested, id) {
                return invalid!(
                    "addresses",
                    format!("nesting network {nested} would create a cycle")
                );
            }
        }
        // compute who this edit reaches before writing anything
        let policies = db::policies::list_all(shared).await?;
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        let touched = events::network_touched(&all, &policies, &dynamics, id);
        // apply the rename, the save and the edit flags in one transaction
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::networks::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::networks::build(&mut pipe, &cast, shared)?;
        db::policies::build_mark_edited(&mut pipe, &touched.policies, shared);
        db::dynamic_policies::build_mark_edited(&mut pipe, &touched.dynamic_policies, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(cast)
    }

    /// Delete a network
    ///
    /// Networks still nested by other networks cannot be deleted. Term and
    /// filter references are stripped like cascade deleted link rows and the
    /// owning policies are flagged as edited.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the network to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Network::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::networks::get(id, shared).await?;
        let all = db::networks::list_all(shared).await?;
        // networks nested elsewhere cannot be deleted
        if all
            .iter()
            .any(|network| network.nested_ids().contains(&id))
        {
            return forbidden!("Cannot delete a network that is nested by another network".to_owned());
        }
        let mut pipe = redis::pipe();
        // strip this network out of any policy terms
        let policies = db::policies::list_all(shared).await?;
        for mut policy in policies {
            let mut stripped = false;
            for term in &mut policy.terms {
                if let crate::models::TermBody::Filter(filter) = &mut term.body {
                    let before =
                        filter.source_networks.len() + filter.destination_networks.len();
                    filter.source_networks.retain(|nid| *nid != id);
                    filter.destination_networks.retain(|nid| *nid != id);
                    if filter.source_networks.len() + filter.destination_networks.len() != before {
                        stripped = true;
                        // a negation over a now empty list silently clears
                        filter.validate()?;
                    }
                }
            }
            if stripped {
                policy.edited = true;
                db::policies::build(&mut pipe, &policy, shared)?;
            }
        }
        // strip this network out of any dynamic policy filters
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        for mut dynamic in dynamics {
            let before = dynamic.source_filters.len() + dynamic.destination_filters.len();
            dynamic.source_filters.retain(|nid| *nid != id);
            dynamic.destination_filters.retain(|nid| *nid != id);
            if dynamic.source_filters.len() + dynamic.destination_filters.len() != before {
                dynamic.edited = true;
                db::dynamic_policies::build(&mut pipe, &dynamic, shared)?;
            }
        }
        db::networks::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }

    /// Get the objects referencing a network
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the network to look up
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Network::usage", skip(shared), err(Debug))]
    pub async fn usage(id: i64, shared: &Shared) -> Result<NetworkUsage, ApiError> {
        // make sure this network exists
        db::networks::get(id, shared).await?;
        let policies = db::policies::list_all(shared).await?;
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        let networks = db::networks::list_all(shared).await?;
        let mut usage = NetworkUsage {
            policies: policies
                .iter()
                .filter(|policy| {
                    policy.terms.iter().any(|term| {
                        term.body.filter().is_some_and(|filter| {
                            filter.source_networks.contains(&id)
                                || filter.destination_networks.contains(&id)
                        })
                    })
                })
                .map(|policy| policy.id)
                .collect(),
            dynamic_policies: dynamics
                .iter()
                .filter(|dynamic| {
                    dynamic.source_filters.contains(&id)
                        || dynamic.destination_filters.contains(&id)
                })
                .map(|dynamic| dynamic.id)
                .collect(),
            networks: networks
                .iter()
                .filter(|network| network.nested_ids().contains(&id))
                .map(|network| network.id)
                .collect(),
        };
        usage.policies.sort_unstable();
        usage.dynamic_policies.sort_unstable();
        usage.networks.sort_unstable();
        Ok(usage)
    }
}
