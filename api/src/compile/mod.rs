//! Compiles policies into per target ACL configs
//!
//! The pipeline expands nested policies into a flat term list, resolves
//! negations into address space complements, builds a naming table over the
//! reachable networks/services and hands per protocol term records to the
//! target renderer.

use std::collections::HashMap;

use crate::models::{DefaultAction, Network, Policy, Service, Target};
use crate::not_found;
use crate::utils::ApiError;

pub mod check;
pub mod emit;
pub mod expand;
pub mod naming;
pub mod negate;
pub mod render;
pub mod resolve;

pub use emit::TermRecord;
pub use expand::ExpandedTerm;
pub use naming::Definitions;

/// An in memory snapshot of the authored objects a compile needs
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// All authored networks by id
    pub networks: HashMap<i64, Network>,
    /// All authored services by id
    pub services: HashMap<i64, Service>,
    /// All authored policies by id
    pub policies: HashMap<i64, Policy>,
}

impl Catalog {
    /// Build a catalog from full entity lists
    ///
    /// # Arguments
    ///
    /// * `networks` - All authored networks
    /// * `services` - All authored services
    /// * `policies` - All authored policies
    #[must_use]
    pub fn new(networks: Vec<Network>, services: Vec<Service>, policies: Vec<Policy>) -> Self {
        Catalog {
            networks: networks.into_iter().map(|net| (net.id, net)).collect(),
            services: services.into_iter().map(|svc| (svc.id, svc)).collect(),
            policies: policies.into_iter().map(|policy| (policy.id, policy)).collect(),
        }
    }

    /// Get a network by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the network to get
    pub fn network(&self, id: i64) -> Result<&Network, ApiError> {
        match self.networks.get(&id) {
            Some(network) => Ok(network),
            None => not_found!(format!("network {id} not found")),
        }
    }

    /// Get a service by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the service to get
    pub fn service(&self, id: i64) -> Result<&Service, ApiError> {
        match self.services.get(&id) {
            Some(service) => Ok(service),
            None => not_found!(format!("service {id} not found")),
        }
    }

    /// Get a policy by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the policy to get
    pub fn policy(&self, id: i64) -> Result<&Policy, ApiError> {
        match self.policies.get(&id) {
            Some(policy) => Ok(policy),
            None => not_found!(format!("policy {id} not found")),
        }
    }
}

/// A rendered config and its deployment names
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPolicy {
    /// The rendered config text
    pub config: String,
    /// The external name of the rendered filter
    pub filter_name: String,
    /// The filename this config deploys as
    pub filename: String,
}

/// Build the term records and naming table for a flat term list
///
/// # Arguments
///
/// * `catalog` - The authored objects to compile against
/// * `valid_name` - The valid name of the policy being compiled
/// * `terms` - The expanded terms to compile
/// * `default_action` - An optional terminal action to append
pub fn build_records(
    catalog: &Catalog,
    valid_name: &str,
    terms: &[ExpandedTerm],
    default_action: Option<DefaultAction>,
) -> Result<(Vec<TermRecord>, Definitions), ApiError> {
    let records = emit::records(catalog, valid_name, terms, default_action)?;
    let definitions = Definitions::build(catalog, terms)?;
    Ok((records, definitions))
}

/// Compile a flat term list into the config text for one target
///
/// # Arguments
///
/// * `catalog` - The authored objects to compile against
/// * `name` - The name of the policy being compiled
/// * `comment` - The policy comment to embed in the config
/// * `custom_header` - A custom header overriding the generated one
/// * `terms` - The expanded terms to compile
/// * `target` - The target to render for
/// * `default_action` - An optional terminal action to append
pub fn generate(
    catalog: &Catalog,
    name: &str,
    comment: Option<&str>,
    custom_header: Option<&str>,
    terms: &[ExpandedTerm],
    target: &Target,
    default_action: Option<DefaultAction>,
) -> Result<CompiledPolicy, ApiError> {
    use crate::models::{GeneratorKind, InetMode};
    // policy names become filter names with spaces replaced
    let filter_name = name.replace(' ', "-");
    // build the target header line
    let header = match custom_header {
        Some(header) => header.to_owned(),
        None => match (target.generator, target.inet_mode) {
            (GeneratorKind::Cisco, InetMode::Inet) => "extended".to_owned(),
            (GeneratorKind::Nftables, mode) => format!("{mode} input"),
            (_, mode) => format!("{filter_name} {mode}"),
        },
    };
    // build the records and naming table
    let (records, definitions) = build_records(catalog, &filter_name, terms, default_action)?;
    // hand everything to the target renderer
    let mut config = render::render(
        target.generator,
        &filter_name,
        comment,
        &header,
        &records,
        &definitions,
    )?;
    // rewrite the nftables table declaration so redeploys stay idempotent
    if target.generator == GeneratorKind::Nftables {
        config = config.replace(
            "table inet filtering_policies",
            &format!("table bridge {filter_name}"),
        );
        config = config.replace(
            "type filter hook input priority 0; policy drop;",
            "type filter hook postrouting priority 0;",
        );
    }
    // apply the targets literal substitutions in order
    for substitution in &target.substitutions {
        config = config.replace(&substitution.name, &substitution.value);
    }
    // pick the filename from the generators extension
    let filename = format!("{filter_name}.{}", target.generator.extension());
    Ok(CompiledPolicy {
        config,
        filter_name,
        filename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FilterTerm, GeneratorKind, InetMode, Network, NetworkAddress, NetworkEntry, Policy,
        PolicyTerm, TargetSubstitution, TermAction, TermBody,
    };
    use chrono::Utc;
    use std::str::FromStr;

    /// build a catalog with one network and one policy for tests
    fn catalog() -> Catalog {
        let lab = Network {
            id: 1,
            name: "lab".to_owned(),
            addresses: vec![NetworkAddress {
                id: 1,
                entry: NetworkEntry::Address {
                    address: cidr::IpCidr::from_str("10.0.0.0/8").unwrap(),
                    comment: None,
                },
            }],
            created: Utc::now(),
        };
        let policy = Policy {
            id: 1,
            name: "edge policy".to_owned(),
            comment: Some("the edge filter".to_owned()),
            custom_header: None,
            edited: false,
            terms: vec![PolicyTerm {
                id: 1,
                name: "allow lab".to_owned(),
                body: TermBody::Filter(FilterTerm {
                    enabled: true,
                    action: TermAction::Accept,
                    option: None,
                    logging: false,
                    negate_source_networks: false,
                    negate_destination_networks: false,
                    source_networks: vec![1],
                    destination_networks: vec![],
                    source_services: vec![],
                    destination_services: vec![],
                }),
            }],
            targets: vec![1],
            tests: vec![],
            created: Utc::now(),
        };
        Catalog::new(vec![lab], vec![], vec![policy])
    }

    /// build a target for tests
    fn target(generator: GeneratorKind, inet_mode: InetMode) -> Target {
        Target {
            id: 1,
            name: "edge-rtr".to_owned(),
            generator,
            inet_mode,
            substitutions: vec![],
            created: Utc::now(),
        }
    }

    /// expand the test policy into its terms
    fn terms(catalog: &Catalog) -> Vec<ExpandedTerm> {
        expand::expand(&catalog.policies[&1], catalog).unwrap()
    }

    #[test]
    fn filter_names_replace_spaces_and_pick_extensions() {
        let catalog = catalog();
        let terms = terms(&catalog);
        let compiled = generate(
            &catalog,
            "edge policy",
            None,
            None,
            &terms,
            &target(GeneratorKind::Cisco, InetMode::Inet),
            None,
        )
        .unwrap();
        assert_eq!(compiled.filter_name, "edge-policy");
        assert_eq!(compiled.filename, "edge-policy.acl");
    }

    #[test]
    fn nftables_tables_are_rewritten_for_redeploys() {
        let catalog = catalog();
        let terms = terms(&catalog);
        let compiled = generate(
            &catalog,
            "edge policy",
            None,
            None,
            &terms,
            &target(GeneratorKind::Nftables, InetMode::Inet),
            None,
        )
        .unwrap();
        // the inet table became a bridge table named after the filter
        assert!(compiled.config.contains("table bridge edge-policy"));
        assert!(!compiled.config.contains("table inet filtering_policies"));
        // the hook moved to postrouting with no drop policy
        assert!(compiled
            .config
            .contains("type filter hook postrouting priority 0;"));
        assert!(!compiled.config.contains("policy drop;"));
        assert_eq!(compiled.filename, "edge-policy.nft");
        // compiling the same inputs twice gives identical text
        let again = generate(
            &catalog,
            "edge policy",
            None,
            None,
            &terms,
            &target(GeneratorKind::Nftables, InetMode::Inet),
            None,
        )
        .unwrap();
        assert_eq!(compiled.config, again.config);
    }

    #[test]
    fn substitutions_apply_in_order() {
        let catalog = catalog();
        let terms = terms(&catalog);
        let mut target = target(GeneratorKind::Cisco, InetMode::Inet);
        target.substitutions = vec![
            TargetSubstitution {
                name: "10.0.0.0".to_owned(),
                value: "TEMP".to_owned(),
            },
            TargetSubstitution {
                name: "TEMP".to_owned(),
                value: "172.16.0.0".to_owned(),
            },
        ];
        let compiled = generate(
            &catalog,
            "edge policy",
            None,
            None,
            &terms,
            &target,
            None,
        )
        .unwrap();
        assert!(compiled.config.contains("172.16.0.0"));
        assert!(!compiled.config.contains("10.0.0.0"));
    }

    #[test]
    fn custom_headers_override_the_generated_one() {
        let catalog = catalog();
        let terms = terms(&catalog);
        let compiled = generate(
            &catalog,
            "edge policy",
            None,
            Some("handcrafted header"),
            &terms,
            &target(GeneratorKind::Cisco, InetMode::Inet),
            None,
        )
        .unwrap();
        assert!(compiled.config.contains("handcrafted header"));
    }

    #[test]
    fn default_actions_append_a_terminal_record() {
        let catalog = catalog();
        let terms = terms(&catalog);
        let compiled = generate(
            &catalog,
            "edge policy",
            None,
            None,
            &terms,
            &target(GeneratorKind::Cisco, InetMode::Inet),
            Some(DefaultAction::Deny),
        )
        .unwrap();
        assert!(compiled.config.contains("edge-policy-Default-Deny"));
    }
}
