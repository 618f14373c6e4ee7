//! Wrappers for interacting with policies within aclforge

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

use super::{db, events};
use crate::models::{
    paginate, ListParams, Page, Policy, PolicyRequest, PolicyTerm, PolicyUsage, RevisionSource,
    TermBody,
};
use crate::utils::{bounder, ApiError, Shared};
use crate::{conn, forbidden, invalid};

/// Check whether one policy can reach another through nested terms
///
/// # Arguments
///
/// * `policies` - All authored policies by id
/// * `from` - The policy to start from
/// * `to` - The policy to look for
fn reaches(policies: &HashMap<i64, &Policy>, from: i64, to: i64) -> bool {
    let mut frontier = vec![from];
    let mut seen = HashSet::new();
    while let Some(id) = frontier.pop() {
        if id == to {
            return true;
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(policy) = policies.get(&id) {
            frontier.extend(policy.nested_ids());
        }
    }
    false
}

/// Fill the test links for a batch of policies
///
/// # Arguments
///
/// * `policies` - The policies to fill
/// * `shared` - Shared aclforge objects
async fn fill_tests(policies: &mut [Policy], shared: &Shared) -> Result<(), ApiError> {
    let tests = db::policy_tests::list_all(shared).await?;
    for policy in policies {
        policy.tests = tests
            .iter()
            .filter(|test| test.policies.contains(&policy.id))
            .map(|test| test.id)
            .collect();
        policy.tests.sort_unstable();
    }
    Ok(())
}

impl Policy {
    /// Validate and apply a request onto a policy shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this policy owns
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    async fn from_request(id: i64, req: PolicyRequest, shared: &Shared) -> Result<Policy, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        // term names must be unique within the policy
        let mut names = HashSet::with_capacity(req.terms.len());
        for term in &req.terms {
            if !names.insert(term.name.as_str()) {
                return invalid!("terms", format!("term {} appears more than once", term.name));
            }
        }
        // validate every term and collect what they reference
        let mut networks = Vec::new();
        let mut services = Vec::new();
        let mut nested = Vec::new();
        let mut bodies = Vec::with_capacity(req.terms.len());
        for term in req.terms {
            let body = match term.body {
                TermBody::Filter(mut filter) => {
                    filter.validate()?;
                    networks.extend(filter.source_networks.iter().copied());
                    networks.extend(filter.destination_networks.iter().copied());
                    services.extend(filter.source_services.iter().copied());
                    services.extend(filter.destination_services.iter().copied());
                    TermBody::Filter(filter)
                }
                TermBody::Nested(inner) => {
                    if inner.nested_policy_id == id {
                        return invalid!("terms", "a policy term cannot nest its own policy");
                    }
                    nested.push(inner.nested_policy_id);
                    TermBody::Nested(inner)
                }
            };
            bodies.push((term.name, body));
        }
        db::networks::exists(&networks, shared).await?;
        db::services::exists(&services, shared).await?;
        db::policies::exists(&nested, shared).await?;
        db::targets::exists(&req.targets, shared).await?;
        // give every term its own id
        let start = db::ids::reserve("policy_terms", bodies.len() as i64, shared).await?;
        let terms = bodies
            .into_iter()
            .enumerate()
            .map(|(index, (name, body))| PolicyTerm {
                id: start + index as i64,
                name,
                body,
            })
            .collect();
        Ok(Policy {
            id,
            name: req.name,
            comment: req.comment,
            custom_header: req.custom_header,
            edited: false,
            terms,
            targets: req.targets,
            tests: Vec::new(),
            created: Utc::now(),
        })
    }

    /// Create a policy
    ///
    /// # Arguments
    ///
    /// * `req` - The policy create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Policy::create", skip_all, err(Debug))]
    pub async fn create(req: PolicyRequest, shared: &Shared) -> Result<Policy, ApiError> {
        let id = db::ids::next("policies", shared).await?;
        let cast = Policy::from_request(id, req, shared).await?;
        db::policies::create(cast, shared).await
    }

    /// Get a policy by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the policy to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Policy::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<Policy, ApiError> {
        let mut policy = db::policies::get(id, shared).await?;
        fill_tests(std::slice::from_mut(&mut policy), shared).await?;
        Ok(policy)
    }

    /// List policies
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Policy::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<Policy>, ApiError> {
        let mut policies = db::policies::list_all(shared).await?;
        fill_tests(&mut policies, shared).await?;
        paginate(policies, &params)
    }

    /// Replace a policy and propagate the edit
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the policy to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Policy::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(id: i64, req: PolicyRequest, shared: &Shared) -> Result<Policy, ApiError> {
        let old = db::policies::get(id, shared).await?;
        if req.name != old.name && db::policies::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A policy with this name already exists");
        }
        let mut cast = Policy::from_request(id, req, shared).await?;
        cast.created = old.created;
        // the policy itself changed since its last revision
        cast.edited = true;
        // nesting a policy that reaches back here would be a cycle
        let all = db::policies::list_all(shared).await?;
        let by_id: HashMap<i64, &Policy> = all.iter().map(|policy| (policy.id, policy)).collect();
        for nested in cast.nested_ids() {
            if reaches(&by_id, nested, id) {
                return invalid!(
                    "terms",
                    format!("nesting policy {nested} would create a cycle")
                );
            }
        }
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        let touched = events::policy_touched(&all, &dynamics, id);
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::policies::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::policies::build(&mut pipe, &cast, shared)?;
        db::policies::build_mark_edited(&mut pipe, &touched.policies, shared);
        db::dynamic_policies::build_mark_edited(&mut pipe, &touched.dynamic_policies, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        fill_tests(std::slice::from_mut(&mut cast), shared).await?;
        Ok(cast)
    }

    /// Delete a policy
    ///
    /// Policies spliced into other policies cannot be deleted. Revisions of
    /// this policy and their deployments are cascade deleted, and dynamic
    /// policy and test references are stripped.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the policy to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Policy::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::policies::get(id, shared).await?;
        let all = db::policies::list_all(shared).await?;
        if all.iter().any(|policy| policy.nested_ids().contains(&id)) {
            return forbidden!("Policy is being used in a nested policy term".to_owned());
        }
        let mut pipe = redis::pipe();
        // strip this policy out of any dynamic policy filters
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        for mut dynamic in dynamics {
            if dynamic.policy_filters.contains(&id) {
                dynamic.policy_filters.retain(|pid| *pid != id);
                dynamic.edited = true;
                db::dynamic_policies::build(&mut pipe, &dynamic, shared)?;
            }
        }
        // strip this policy out of any tests
        let tests = db::policy_tests::list_all(shared).await?;
        for mut test in tests {
            if test.policies.contains(&id) {
                test.policies.retain(|pid| *pid != id);
                db::policy_tests::build(&mut pipe, &test, shared)?;
            }
        }
        // cascade delete this policies revisions and their deployments
        let revisions = db::revisions::list_all(shared).await?;
        let deployments = db::deployments::list_all(shared).await?;
        for revision in revisions {
            if revision.source == (RevisionSource::Policy { policy_id: id }) {
                for deployment in &deployments {
                    if deployment.revision_id == revision.id {
                        db::deployments::build_delete(&mut pipe, deployment.id, shared);
                    }
                }
                db::revisions::build_delete(&mut pipe, revision.id, shared);
            }
        }
        db::policies::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }

    /// Get the objects referencing a policy
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the policy to look up
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "Policy::usage", skip(shared), err(Debug))]
    pub async fn usage(id: i64, shared: &Shared) -> Result<PolicyUsage, ApiError> {
        db::policies::get(id, shared).await?;
        let policies = db::policies::list_all(shared).await?;
        let dynamics = db::dynamic_policies::list_all(shared).await?;
        let mut usage = PolicyUsage {
            policies: policies
                .iter()
                .filter(|policy| policy.nested_ids().contains(&id))
                .map(|policy| policy.id)
                .collect(),
            dynamic_policies: dynamics
                .iter()
                .filter(|dynamic| dynamic.policy_filters.contains(&id))
                .map(|dynamic| dynamic.id)
                .collect(),
        };
        usage.policies.sort_unstable();
        usage.dynamic_policies.sort_unstable();
        Ok(usage)
    }
}
