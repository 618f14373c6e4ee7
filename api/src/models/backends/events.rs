//! The edit propagation walks fired by mutations
//!
//! Whenever a network, service, target or nested policy changes, every
//! policy and dynamic policy transitively referencing it has to be flagged
//! as edited. The walks here are pure reverse reachability over the
//! authored graph; the db layer applies the computed flags inside the same
//! atomic pipeline as the mutation.

use std::collections::HashSet;

use crate::models::{DynamicPolicy, Network, Policy, Service};

/// The policies and dynamic policies a mutation reaches
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Touched {
    /// The policies to flag as edited
    pub policies: HashSet<i64>,
    /// The dynamic policies to flag as edited
    pub dynamic_policies: HashSet<i64>,
}

impl Touched {
    /// Whether this walk reached nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.dynamic_policies.is_empty()
    }
}

/// Walk upward through nested network references to all ancestors
///
/// # Arguments
///
/// * `networks` - All authored networks
/// * `seed` - The network the walk starts from
fn network_ancestors(networks: &[Network], seed: i64) -> HashSet<i64> {
    let mut affected = HashSet::from([seed]);
    // bounded by acyclicity so a simple fixpoint walk terminates
    loop {
        let mut grew = false;
        for network in networks {
            if affected.contains(&network.id) {
                continue;
            }
            if network
                .nested_ids()
                .iter()
                .any(|nested| affected.contains(nested))
            {
                affected.insert(network.id);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    affected
}

/// Walk upward through nested policy terms to all referencing policies
///
/// # Arguments
///
/// * `policies` - All authored policies
/// * `seeds` - The policies the walk starts from
fn policy_ancestors(policies: &[Policy], seeds: &HashSet<i64>) -> HashSet<i64> {
    let mut affected = seeds.clone();
    loop {
        let mut grew = false;
        for policy in policies {
            if affected.contains(&policy.id) {
                continue;
            }
            if policy
                .nested_ids()
                .iter()
                .any(|nested| affected.contains(nested))
            {
                affected.insert(policy.id);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    affected
}

/// Find the dynamic policies whose policy filters reach a policy set
///
/// # Arguments
///
/// * `dynamics` - All authored dynamic policies
/// * `policies` - The policies the filters may reference
fn dynamics_by_policy(dynamics: &[DynamicPolicy], policies: &HashSet<i64>) -> HashSet<i64> {
    dynamics
        .iter()
        .filter(|dynamic| {
            dynamic
                .policy_filters
                .iter()
                .any(|id| policies.contains(id))
        })
        .map(|dynamic| dynamic.id)
        .collect()
}

/// Compute everything touched by mutating a network
///
/// # Arguments
///
/// * `networks` - All authored networks
/// * `policies` - All authored policies
/// * `dynamics` - All authored dynamic policies
/// * `network_id` - The network that was mutated
#[must_use]
pub fn network_touched(
    networks: &[Network],
    policies: &[Policy],
    dynamics: &[DynamicPolicy],
    network_id: i64,
) -> Touched {
    // every network that nests the mutated one is affected too
    let affected_networks = network_ancestors(networks, network_id);
    // policies with terms using any affected network
    let direct: HashSet<i64> = policies
        .iter()
        .filter(|policy| {
            policy.terms.iter().any(|term| {
                term.body.filter().is_some_and(|filter| {
                    filter
                        .source_networks
                        .iter()
                        .chain(filter.destination_networks.iter())
                        .any(|id| affected_networks.contains(id))
                })
            })
        })
        .map(|policy| policy.id)
        .collect();
    // policies nesting those policies transitively reference the network
    let touched_policies = policy_ancestors(policies, &direct);
    // dynamic policies filtering on an affected network or policy
    let mut touched_dynamics: HashSet<i64> = dynamics
        .iter()
        .filter(|dynamic| {
            dynamic
                .source_filters
                .iter()
                .chain(dynamic.destination_filters.iter())
                .any(|id| affected_networks.contains(id))
        })
        .map(|dynamic| dynamic.id)
        .collect();
    touched_dynamics.extend(dynamics_by_policy(dynamics, &touched_policies));
    Touched {
        policies: touched_policies,
        dynamic_policies: touched_dynamics,
    }
}

/// Compute everything touched by mutating a service
///
/// # Arguments
///
/// * `services` - All authored services
/// * `policies` - All authored policies
/// * `dynamics` - All authored dynamic policies
/// * `service_id` - The service that was mutated
#[must_use]
pub fn service_touched(
    services: &[Service],
    policies: &[Policy],
    dynamics: &[DynamicPolicy],
    service_id: i64,
) -> Touched {
    // every service that nests the mutated one is affected too
    let mut affected_services = HashSet::from([service_id]);
    loop {
        let mut grew = false;
        for service in services {
            if affected_services.contains(&service.id) {
                continue;
            }
            if service
                .nested_ids()
                .iter()
                .any(|nested| affected_services.contains(nested))
            {
                affected_services.insert(service.id);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    let direct: HashSet<i64> = policies
        .iter()
        .filter(|policy| {
            policy.terms.iter().any(|term| {
                term.body.filter().is_some_and(|filter| {
                    filter
                        .source_services
                        .iter()
                        .chain(filter.destination_services.iter())
                        .any(|id| affected_services.contains(id))
                })
            })
        })
        .map(|policy| policy.id)
        .collect();
    let touched_policies = policy_ancestors(policies, &direct);
    let touched_dynamics = dynamics_by_policy(dynamics, &touched_policies);
    Touched {
        policies: touched_policies,
        dynamic_policies: touched_dynamics,
    }
}

/// Compute everything touched by mutating a target
///
/// # Arguments
///
/// * `policies` - All authored policies
/// * `dynamics` - All authored dynamic policies
/// * `target_id` - The target that was mutated
#[must_use]
pub fn target_touched(policies: &[Policy], dynamics: &[DynamicPolicy], target_id: i64) -> Touched {
    let touched_policies: HashSet<i64> = policies
        .iter()
        .filter(|policy| policy.targets.contains(&target_id))
        .map(|policy| policy.id)
        .collect();
    let touched_dynamics: HashSet<i64> = dynamics
        .iter()
        .filter(|dynamic| dynamic.targets.contains(&target_id))
        .map(|dynamic| dynamic.id)
        .collect();
    Touched {
        policies: touched_policies,
        dynamic_policies: touched_dynamics,
    }
}

/// Compute everything touched by mutating a policy
///
/// # Arguments
///
/// * `policies` - All authored policies
/// * `dynamics` - All authored dynamic policies
/// * `policy_id` - The policy that was mutated
#[must_use]
pub fn policy_touched(policies: &[Policy], dynamics: &[DynamicPolicy], policy_id: i64) -> Touched {
    // walk up through every policy nesting the mutated one
    let mut touched_policies = policy_ancestors(policies, &HashSet::from([policy_id]));
    let touched_dynamics = dynamics_by_policy(dynamics, &touched_policies);
    // the policy itself is flagged by its own update path
    touched_policies.remove(&policy_id);
    Touched {
        policies: touched_policies,
        dynamic_policies: touched_dynamics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FilterTerm, NetworkAddress, NetworkEntry, PolicyTerm, TermAction, TermBody,
    };
    use chrono::Utc;

    /// build a network nesting another for tests
    fn network(id: i64, name: &str, nested: Option<i64>) -> Network {
        let addresses = match nested {
            Some(nested) => vec![NetworkAddress {
                id,
                entry: NetworkEntry::Nested {
                    nested_network_id: nested,
                },
            }],
            None => vec![],
        };
        Network {
            id,
            name: name.to_owned(),
            addresses,
            created: Utc::now(),
        }
    }

    /// build a policy with one term using a network for tests
    fn policy_using(id: i64, network_id: Option<i64>, nested_policy: Option<i64>) -> Policy {
        let body = match nested_policy {
            Some(nested_policy_id) => {
                TermBody::Nested(crate::models::NestedTerm { nested_policy_id })
            }
            None => TermBody::Filter(FilterTerm {
                enabled: true,
                action: TermAction::Accept,
                option: None,
                logging: false,
                negate_source_networks: false,
                negate_destination_networks: false,
                source_networks: network_id.into_iter().collect(),
                destination_networks: vec![],
                source_services: vec![],
                destination_services: vec![],
            }),
        };
        Policy {
            id,
            name: format!("policy-{id}"),
            comment: None,
            custom_header: None,
            edited: false,
            terms: vec![PolicyTerm {
                id,
                name: "term".to_owned(),
                body,
            }],
            targets: vec![],
            tests: vec![],
            created: Utc::now(),
        }
    }

    /// build a dynamic policy filtering on a network for tests
    fn dynamic_filtering(id: i64, network_id: i64) -> DynamicPolicy {
        DynamicPolicy {
            id,
            name: format!("dynamic-{id}"),
            comment: None,
            filter_action: None,
            default_action: None,
            source_filters: vec![network_id],
            destination_filters: vec![],
            policy_filters: vec![],
            targets: vec![],
            tests: vec![],
            edited: false,
            created: Utc::now(),
        }
    }

    #[test]
    fn network_edits_reach_exactly_the_referencing_policies() {
        // net 1 is nested by net 2; p1 uses net 1, p2 uses net 2,
        // p3 nests p1 and p4 uses an unrelated network
        let networks = vec![network(1, "inner", None), network(2, "outer", Some(1))];
        let policies = vec![
            policy_using(1, Some(1), None),
            policy_using(2, Some(2), None),
            policy_using(3, None, Some(1)),
            policy_using(4, Some(9), None),
        ];
        let touched = network_touched(&networks, &policies, &[], 1);
        assert_eq!(touched.policies, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn network_edits_reach_filtering_dynamic_policies() {
        let networks = vec![network(1, "inner", None), network(2, "outer", Some(1))];
        let dynamics = vec![dynamic_filtering(1, 2), dynamic_filtering(2, 7)];
        let touched = network_touched(&networks, &[], &dynamics, 1);
        assert_eq!(touched.dynamic_policies, HashSet::from([1]));
    }

    #[test]
    fn target_edits_reach_bound_policies() {
        let mut bound = policy_using(1, None, None);
        bound.targets = vec![4];
        let unbound = policy_using(2, None, None);
        let touched = target_touched(&[bound, unbound], &[], 4);
        assert_eq!(touched.policies, HashSet::from([1]));
    }

    #[test]
    fn policy_edits_walk_up_the_nesting_graph() {
        // p2 nests p1 and p3 nests p2
        let policies = vec![
            policy_using(1, Some(1), None),
            policy_using(2, None, Some(1)),
            policy_using(3, None, Some(2)),
        ];
        let touched = policy_touched(&policies, &[], 1);
        assert_eq!(touched.policies, HashSet::from([2, 3]));
    }
}
