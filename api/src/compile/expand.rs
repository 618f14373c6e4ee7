//! Flattens nested policies into a linear ordered term list

use utoipa::ToSchema;

use super::Catalog;
use crate::bad;
use crate::models::{Policy, PolicyTerm, TermAction, TermBody, TermOption};
use crate::utils::ApiError;

/// A term flattened out of its policy and any nesting
///
/// Expanded terms keep the id of the term they came from so duplicate ids
/// can appear when two nested terms splice in the same policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ExpandedTerm {
    /// The id of the term this was expanded from
    pub id: i64,
    /// The id of the policy that owns the original term
    pub policy_id: i64,
    /// The name of the original term
    pub name: String,
    /// The externally visible name of this term
    pub valid_name: String,
    /// Whether this term is compiled into configs
    pub enabled: bool,
    /// The action this term takes
    pub action: TermAction,
    /// An extra match option for this term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<TermOption>,
    /// Whether matches on this term are logged
    pub logging: bool,
    /// Whether the source side matches the complement of its networks
    pub negate_source_networks: bool,
    /// Whether the destination side matches the complement of its networks
    pub negate_destination_networks: bool,
    /// The networks traffic may come from (empty means any)
    pub source_networks: Vec<i64>,
    /// The networks traffic may go to (empty means any)
    pub destination_networks: Vec<i64>,
    /// The services traffic may come from (empty means any)
    pub source_services: Vec<i64>,
    /// The services traffic may go to (empty means any)
    pub destination_services: Vec<i64>,
}

impl ExpandedTerm {
    /// Flatten a filtering term against its owning policy
    ///
    /// # Arguments
    ///
    /// * `policy` - The policy that owns this term
    /// * `term` - The term to flatten
    #[must_use]
    pub fn from_term(policy: &Policy, term: &PolicyTerm) -> Option<Self> {
        let filter = term.body.filter()?;
        Some(ExpandedTerm {
            id: term.id,
            policy_id: policy.id,
            name: term.name.clone(),
            valid_name: term.valid_name(&policy.valid_name()),
            enabled: filter.enabled,
            action: filter.action,
            option: filter.option,
            logging: filter.logging,
            negate_source_networks: filter.negate_source_networks,
            negate_destination_networks: filter.negate_destination_networks,
            source_networks: filter.source_networks.clone(),
            destination_networks: filter.destination_networks.clone(),
            source_services: filter.source_services.clone(),
            destination_services: filter.destination_services.clone(),
        })
    }
}

/// Expand a policy's terms depth first, splicing nested policies inline
///
/// Disabled terms are retained so later stages can report on them. A policy
/// revisited on the current expansion path means the nesting graph has a
/// cycle and expansion fails.
///
/// # Arguments
///
/// * `policy` - The policy to expand
/// * `catalog` - The authored objects to expand against
pub fn expand(policy: &Policy, catalog: &Catalog) -> Result<Vec<ExpandedTerm>, ApiError> {
    let mut flat = Vec::with_capacity(policy.terms.len());
    let mut path = vec![policy.id];
    expand_into(policy, catalog, &mut path, &mut flat)?;
    Ok(flat)
}

/// Splice one policy's terms into the flattened list
///
/// # Arguments
///
/// * `policy` - The policy whose terms are being spliced
/// * `catalog` - The authored objects to expand against
/// * `path` - The policy ids on the current expansion path
/// * `flat` - The flattened list being built
fn expand_into(
    policy: &Policy,
    catalog: &Catalog,
    path: &mut Vec<i64>,
    flat: &mut Vec<ExpandedTerm>,
) -> Result<(), ApiError> {
    for term in &policy.terms {
        match &term.body {
            TermBody::Filter(_) => {
                if let Some(expanded) = ExpandedTerm::from_term(policy, term) {
                    flat.push(expanded);
                }
            }
            TermBody::Nested(nested) => {
                // a policy already on this path means the graph has a cycle
                if path.contains(&nested.nested_policy_id) {
                    return bad!(format!(
                        "cycle detected expanding policy {} through term {}",
                        nested.nested_policy_id, term.name
                    ));
                }
                let inner = catalog.policy(nested.nested_policy_id)?;
                path.push(inner.id);
                expand_into(inner, catalog, path, flat)?;
                path.pop();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterTerm;
    use chrono::Utc;

    /// build a filtering term for tests
    fn filter_term(id: i64, name: &str, action: TermAction) -> PolicyTerm {
        PolicyTerm {
            id,
            name: name.to_owned(),
            body: TermBody::Filter(FilterTerm {
                enabled: true,
                action,
                option: None,
                logging: false,
                negate_source_networks: false,
                negate_destination_networks: false,
                source_networks: vec![],
                destination_networks: vec![],
                source_services: vec![],
                destination_services: vec![],
            }),
        }
    }

    /// build a nested term for tests
    fn nested_term(id: i64, name: &str, nested_policy_id: i64) -> PolicyTerm {
        PolicyTerm {
            id,
            name: name.to_owned(),
            body: TermBody::Nested(crate::models::NestedTerm { nested_policy_id }),
        }
    }

    /// build a policy for tests
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

    #[test]
    fn nested_policies_splice_inline_in_order() {
        let inner = policy(
            2,
            "shared rules",
            vec![
                filter_term(10, "allow dns", TermAction::Accept),
                filter_term(11, "deny rest", TermAction::Deny),
            ],
        );
        let outer = policy(
            1,
            "edge",
            vec![
                filter_term(20, "first", TermAction::Accept),
                nested_term(21, "splice", 2),
                filter_term(22, "last", TermAction::Deny),
            ],
        );
        let catalog = Catalog::new(vec![], vec![], vec![inner, outer.clone()]);
        let flat = expand(&outer, &catalog).unwrap();
        let names: Vec<&str> = flat.iter().map(|term| term.valid_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "edge-first",
                "shared-rules-allow-dns",
                "shared-rules-deny-rest",
                "edge-last"
            ]
        );
    }

    #[test]
    fn duplicate_nesting_yields_parallel_expansions() {
        let inner = policy(2, "shared", vec![filter_term(10, "rule", TermAction::Accept)]);
        let outer = policy(
            1,
            "edge",
            vec![nested_term(20, "one", 2), nested_term(21, "two", 2)],
        );
        let catalog = Catalog::new(vec![], vec![], vec![inner, outer.clone()]);
        let flat = expand(&outer, &catalog).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].id, flat[1].id);
    }

    #[test]
    fn disabled_terms_are_retained() {
        let mut disabled = filter_term(10, "off", TermAction::Deny);
        if let TermBody::Filter(filter) = &mut disabled.body {
            filter.enabled = false;
        }
        let outer = policy(1, "edge", vec![disabled]);
        let catalog = Catalog::new(vec![], vec![], vec![outer.clone()]);
        let flat = expand(&outer, &catalog).unwrap();
        assert_eq!(flat.len(), 1);
        assert!(!flat[0].enabled);
    }

    #[test]
    fn cycles_are_detected() {
        // a nests b and b nests a
        let a = policy(1, "a", vec![nested_term(10, "to-b", 2)]);
        let b = policy(2, "b", vec![nested_term(20, "to-a", 1)]);
        let catalog = Catalog::new(vec![], vec![], vec![a.clone(), b]);
        let err = expand(&a, &catalog).unwrap_err();
        assert!(err.to_string().contains("cycle detected"));
    }

    #[test]
    fn self_nesting_is_a_cycle() {
        let a = policy(1, "a", vec![nested_term(10, "self", 1)]);
        let catalog = Catalog::new(vec![], vec![], vec![a.clone()]);
        assert!(expand(&a, &catalog).is_err());
    }
}
