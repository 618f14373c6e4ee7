//! Resolves dynamic policies into customized term lists
//!
//! Filter networks are flattened to CIDRs, the CIDRs are mapped back to the
//! networks they fully cover, nested groups are promoted to a fixpoint and
//! finally matching terms are selected and intersected with the filter.

use cidr::IpCidr;
use std::collections::HashSet;

use super::{Catalog, ExpandedTerm};
use crate::models::{DynamicPolicy, NetworkEntry, TermAction};
use crate::utils::ApiError;

/// Whether two CIDRs share any addresses
fn overlaps(left: &IpCidr, right: &IpCidr) -> bool {
    match (left, right) {
        (IpCidr::V4(left), IpCidr::V4(right)) => {
            let (left_first, left_last) = (
                u32::from(left.first_address()),
                u32::from(left.last_address()),
            );
            let (right_first, right_last) = (
                u32::from(right.first_address()),
                u32::from(right.last_address()),
            );
            left_first <= right_last && right_first <= left_last
        }
        (IpCidr::V6(left), IpCidr::V6(right)) => {
            let (left_first, left_last) = (
                u128::from(left.first_address()),
                u128::from(left.last_address()),
            );
            let (right_first, right_last) = (
                u128::from(right.first_address()),
                u128::from(right.last_address()),
            );
            left_first <= right_last && right_first <= left_last
        }
        _ => false,
    }
}

/// Recursively flatten filter networks to their leaf CIDRs
///
/// # Arguments
///
/// * `catalog` - The authored objects to resolve against
/// * `network_ids` - The networks to flatten
pub fn fetch_addresses(catalog: &Catalog, network_ids: &[i64]) -> Result<Vec<IpCidr>, ApiError> {
    let mut cidrs = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier: Vec<i64> = network_ids.to_vec();
    while let Some(id) = frontier.pop() {
        // nested graphs are acyclic but shared children only need one visit
        if !seen.insert(id) {
            continue;
        }
        let network = catalog.network(id)?;
        for address in &network.addresses {
            match &address.entry {
                NetworkEntry::Address { address, .. } => cidrs.push(*address),
                NetworkEntry::Nested { nested_network_id } => frontier.push(*nested_network_id),
            }
        }
    }
    // dedupe while keeping the order deterministic
    let mut unique = HashSet::new();
    cidrs.retain(|cidr| unique.insert(*cidr));
    Ok(cidrs)
}

/// Find the networks fully covered by a set of filter CIDRs
///
/// A network counts only when every one of its address rows is a leaf row
/// overlapping the filter. Networks built from nested references are then
/// promoted to a fixpoint: a network joins the selection once all of its
/// rows are nested references into networks already selected.
///
/// # Arguments
///
/// * `catalog` - The authored objects to resolve against
/// * `filter_cidrs` - The CIDRs the filter covers
#[must_use]
pub fn fetch_networks(catalog: &Catalog, filter_cidrs: &[IpCidr]) -> Vec<i64> {
    // find every leaf address row overlapping the filter
    let mut overlapping_rows = HashSet::new();
    for network in catalog.networks.values() {
        for address in &network.addresses {
            if let NetworkEntry::Address { address: cidr, .. } = &address.entry {
                if filter_cidrs.iter().any(|filter| overlaps(filter, cidr)) {
                    overlapping_rows.insert(address.id);
                }
            }
        }
    }
    // promote networks whose every row is an overlapping leaf row
    let mut selected: HashSet<i64> = catalog
        .networks
        .values()
        .filter(|network| !network.addresses.is_empty())
        .filter(|network| {
            network
                .addresses
                .iter()
                .all(|address| overlapping_rows.contains(&address.id))
        })
        .map(|network| network.id)
        .collect();
    // promote purely nested networks to a fixpoint
    loop {
        let mut grew = false;
        for network in catalog.networks.values() {
            if selected.contains(&network.id) || network.addresses.is_empty() {
                continue;
            }
            let all_nested_selected = network.addresses.iter().all(|address| {
                address
                    .entry
                    .nested_id()
                    .is_some_and(|nested| selected.contains(&nested))
            });
            if all_nested_selected {
                selected.insert(network.id);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    let mut selected: Vec<i64> = selected.into_iter().collect();
    selected.sort_unstable();
    selected
}

/// Whether one side of a term satisfies the filter predicate
///
/// # Arguments
///
/// * `term_networks` - The network ids on this side of the term
/// * `negated` - Whether this side matches the complement of its networks
/// * `filter` - The selected filter network ids
fn side_matches(term_networks: &[i64], negated: bool, filter: &HashSet<i64>) -> bool {
    // an empty filter matches everything
    if filter.is_empty() {
        return true;
    }
    // an empty side is "any" and trivially matches
    if term_networks.is_empty() {
        return true;
    }
    if negated {
        // at least one excluded network must fall outside the filter
        term_networks.iter().any(|id| !filter.contains(id))
    } else {
        term_networks.iter().any(|id| filter.contains(id))
    }
}

/// Select and customize the terms matching a dynamic policy's filters
///
/// Selected terms are cloned before their network lists are intersected
/// with the filter so the stored policies are never mutated.
///
/// # Arguments
///
/// * `catalog` - The authored objects to resolve against
/// * `source_networks` - The selected source filter network ids
/// * `destination_networks` - The selected destination filter network ids
/// * `policy_ids` - Only select terms from these policies
/// * `filter_action` - Only select terms with this action
#[must_use]
pub fn fetch_terms(
    catalog: &Catalog,
    source_networks: &[i64],
    destination_networks: &[i64],
    policy_ids: &[i64],
    filter_action: Option<TermAction>,
) -> Vec<ExpandedTerm> {
    let source_filter: HashSet<i64> = source_networks.iter().copied().collect();
    let destination_filter: HashSet<i64> = destination_networks.iter().copied().collect();
    // walk policies in id order so the output order is stable
    let mut policies: Vec<_> = catalog.policies.values().collect();
    policies.sort_by_key(|policy| policy.id);
    let mut selected = Vec::new();
    for policy in policies {
        if !policy_ids.is_empty() && !policy_ids.contains(&policy.id) {
            continue;
        }
        for term in &policy.terms {
            // only leaf terms are candidates
            let Some(filter) = term.body.filter() else {
                continue;
            };
            if let Some(action) = filter_action {
                if filter.action != action {
                    continue;
                }
            }
            if !side_matches(
                &filter.source_networks,
                filter.negate_source_networks,
                &source_filter,
            ) {
                continue;
            }
            if !side_matches(
                &filter.destination_networks,
                filter.negate_destination_networks,
                &destination_filter,
            ) {
                continue;
            }
            // clone before customizing so stored terms are untouched
            let Some(mut expanded) = ExpandedTerm::from_term(policy, term) else {
                continue;
            };
            if !source_filter.is_empty() && !expanded.source_networks.is_empty() {
                expanded
                    .source_networks
                    .retain(|id| source_filter.contains(id));
            }
            if !destination_filter.is_empty() && !expanded.destination_networks.is_empty() {
                expanded
                    .destination_networks
                    .retain(|id| destination_filter.contains(id));
            }
            selected.push(expanded);
        }
    }
    selected
}

/// Resolve a dynamic policy into its customized term list
///
/// # Arguments
///
/// * `catalog` - The authored objects to resolve against
/// * `dynamic` - The dynamic policy to resolve
pub fn resolve(catalog: &Catalog, dynamic: &DynamicPolicy) -> Result<Vec<ExpandedTerm>, ApiError> {
    // flatten the filter networks to CIDRs
    let source_cidrs = fetch_addresses(catalog, &dynamic.source_filters)?;
    let destination_cidrs = fetch_addresses(catalog, &dynamic.destination_filters)?;
    // map the CIDRs back to fully covered networks
    let source_networks = if source_cidrs.is_empty() {
        Vec::new()
    } else {
        fetch_networks(catalog, &source_cidrs)
    };
    let destination_networks = if destination_cidrs.is_empty() {
        Vec::new()
    } else {
        fetch_networks(catalog, &destination_cidrs)
    };
    // select and customize the matching terms
    Ok(fetch_terms(
        catalog,
        &source_networks,
        &destination_networks,
        &dynamic.policy_filters,
        dynamic.filter_action,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterTerm, Network, NetworkAddress, Policy, PolicyTerm, TermBody};
    use chrono::Utc;
    use std::str::FromStr;

    /// build a network of leaf addresses for tests
    fn network(id: i64, name: &str, rows: &[(i64, &str)]) -> Network {
        Network {
            id,
            name: name.to_owned(),
            addresses: rows
                .iter()
                .map(|(row_id, cidr)| NetworkAddress {
                    id: *row_id,
                    entry: NetworkEntry::Address {
                        address: IpCidr::from_str(cidr).unwrap(),
                        comment: None,
                    },
                })
                .collect(),
            created: Utc::now(),
        }
    }

    /// build a network of nested references for tests
    fn nested_network(id: i64, name: &str, rows: &[(i64, i64)]) -> Network {
        Network {
            id,
            name: name.to_owned(),
            addresses: rows
                .iter()
                .map(|(row_id, nested)| NetworkAddress {
                    id: *row_id,
                    entry: NetworkEntry::Nested {
                        nested_network_id: *nested,
                    },
                })
                .collect(),
            created: Utc::now(),
        }
    }

    /// build a policy with one term per entry for tests
    fn policy(id: i64, name: &str, terms: Vec<PolicyTerm>) -> Policy {
        Policy {
            id,
            name: name.to_owned(),
            comment: None,
            custom_header: None,
            edited: false,
            terms,
            targets: vec![],
            tests: vec![],
            created: Utc::now(),
        }
    }

    /// build a filtering term for tests
    fn term(id: i64, name: &str, sources: Vec<i64>, destinations: Vec<i64>) -> PolicyTerm {
        PolicyTerm {
            id,
            name: name.to_owned(),
            body: TermBody::Filter(FilterTerm {
                enabled: true,
                action: TermAction::Accept,
                option: None,
                logging: false,
                negate_source_networks: false,
                negate_destination_networks: false,
                source_networks: sources,
                destination_networks: destinations,
                source_services: vec![],
                destination_services: vec![],
            }),
        }
    }

    #[test]
    fn nested_addresses_flatten_to_leaf_cidrs() {
        // A = {10.0.0.0/24}, B = {nested A, 10.0.1.0/24}, C = {nested B}
        let a = network(1, "a", &[(1, "10.0.0.0/24")]);
        let mut b = network(2, "b", &[(2, "10.0.1.0/24")]);
        b.addresses.push(NetworkAddress {
            id: 3,
            entry: NetworkEntry::Nested {
                nested_network_id: 1,
            },
        });
        let c = nested_network(3, "c", &[(4, 2)]);
        let catalog = Catalog::new(vec![a, b, c], vec![], vec![]);
        let mut cidrs = fetch_addresses(&catalog, &[3]).unwrap();
        cidrs.sort();
        assert_eq!(
            cidrs,
            vec![
                IpCidr::from_str("10.0.0.0/24").unwrap(),
                IpCidr::from_str("10.0.1.0/24").unwrap()
            ]
        );
    }

    #[test]
    fn only_fully_covered_networks_are_selected() {
        // X is fully inside the filter while Y leaks outside it
        let x = network(1, "x", &[(1, "10.0.0.0/24"), (2, "10.0.1.0/24")]);
        let y = network(2, "y", &[(3, "10.0.0.0/24"), (4, "192.168.0.0/24")]);
        let catalog = Catalog::new(vec![x, y], vec![], vec![]);
        let filter = vec![IpCidr::from_str("10.0.0.0/16").unwrap()];
        let selected = fetch_networks(&catalog, &filter);
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn nested_networks_are_promoted_to_a_fixpoint() {
        let x = network(1, "x", &[(1, "10.0.0.0/24")]);
        let wrapper = nested_network(2, "wrapper", &[(2, 1)]);
        let outer = nested_network(3, "outer", &[(3, 2)]);
        let catalog = Catalog::new(vec![x, wrapper, outer], vec![], vec![]);
        let filter = vec![IpCidr::from_str("10.0.0.0/16").unwrap()];
        let selected = fetch_networks(&catalog, &filter);
        assert_eq!(selected, vec![1, 2, 3]);
    }

    #[test]
    fn terms_are_selected_and_intersected() {
        let x = network(1, "x", &[(1, "10.0.0.0/24")]);
        let z = network(3, "z", &[(5, "172.16.0.0/24")]);
        let selected_term = term(10, "covered", vec![1, 3], vec![]);
        let skipped_term = term(11, "uncovered", vec![3], vec![]);
        let policies = vec![policy(1, "edge", vec![selected_term, skipped_term])];
        let catalog = Catalog::new(vec![x, z], vec![], policies);
        let terms = fetch_terms(&catalog, &[1], &[], &[], None);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].name, "covered");
        // the source list was intersected down to the filter
        assert_eq!(terms[0].source_networks, vec![1]);
    }

    #[test]
    fn any_sides_trivially_match_and_stay_any() {
        let x = network(1, "x", &[(1, "10.0.0.0/24")]);
        let policies = vec![policy(1, "edge", vec![term(10, "wide-open", vec![], vec![])])];
        let catalog = Catalog::new(vec![x], vec![], policies);
        let terms = fetch_terms(&catalog, &[1], &[], &[], None);
        assert_eq!(terms.len(), 1);
        assert!(terms[0].source_networks.is_empty());
    }

    #[test]
    fn negated_sides_match_when_an_exclusion_is_outside_the_filter() {
        let x = network(1, "x", &[(1, "10.0.0.0/24")]);
        let z = network(2, "z", &[(2, "172.16.0.0/24")]);
        let mut negated = term(10, "not-z", vec![2], vec![]);
        if let TermBody::Filter(filter) = &mut negated.body {
            filter.negate_source_networks = true;
        }
        let policies = vec![policy(1, "edge", vec![negated])];
        let catalog = Catalog::new(vec![x, z], vec![], policies);
        // z is outside the filter so the negated term matches
        let terms = fetch_terms(&catalog, &[1], &[], &[], None);
        assert_eq!(terms.len(), 1);
        // but a filter covering z defeats the negation
        let terms = fetch_terms(&catalog, &[2], &[], &[], None);
        assert!(terms.is_empty());
    }

    #[test]
    fn the_full_address_space_selects_every_term_a_narrower_filter_would() {
        let x = network(1, "x", &[(1, "10.0.0.0/24")]);
        let z = network(2, "z", &[(2, "172.16.0.0/24")]);
        let policies = vec![policy(
            1,
            "edge",
            vec![
                term(10, "from-x", vec![1], vec![]),
                term(11, "from-z", vec![2], vec![]),
                term(12, "wide-open", vec![], vec![]),
            ],
        )];
        let catalog = Catalog::new(vec![x, z], vec![], policies);
        // the whole v4 space covers every network
        let everything = fetch_networks(&catalog, &[IpCidr::from_str("0.0.0.0/0").unwrap()]);
        assert_eq!(everything, vec![1, 2]);
        let full = fetch_terms(&catalog, &everything, &[], &[], None);
        // a narrower filter returns a subset of the full resolution
        let narrow_networks = fetch_networks(&catalog, &[IpCidr::from_str("10.0.0.0/16").unwrap()]);
        let narrow = fetch_terms(&catalog, &narrow_networks, &[], &[], None);
        for selected in &narrow {
            assert!(full.iter().any(|term| term.id == selected.id));
        }
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn action_and_policy_filters_constrain_selection() {
        let x = network(1, "x", &[(1, "10.0.0.0/24")]);
        let mut deny = term(10, "deny-term", vec![1], vec![]);
        if let TermBody::Filter(filter) = &mut deny.body {
            filter.action = TermAction::Deny;
        }
        let accept = term(11, "accept-term", vec![1], vec![]);
        let policies = vec![
            policy(1, "first", vec![deny]),
            policy(2, "second", vec![accept]),
        ];
        let catalog = Catalog::new(vec![x], vec![], policies);
        let terms = fetch_terms(&catalog, &[1], &[], &[], Some(TermAction::Deny));
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].name, "deny-term");
        let terms = fetch_terms(&catalog, &[1], &[], &[2], None);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].name, "accept-term");
    }
}
