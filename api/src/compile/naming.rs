//! The naming table handed to target renderers
//!
//! Networks resolve through stable hashed tokens so identical objects reused
//! across terms collapse to identical definitions. Services keep their
//! authored names.

use cidr::IpCidr;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

use super::{negate, resolve, Catalog, ExpandedTerm};
use crate::models::{NetworkEntry, PortRange, Protocol, ServiceEntryKind};
use crate::utils::ApiError;

/// Build the stable token for an object
///
/// # Arguments
///
/// * `kind` - The kind of object being named
/// * `id` - The id of the object being named
#[must_use]
pub fn hashed_name(kind: &str, id: i64) -> String {
    // hash the kind and id together so ids never collide across kinds
    let digest = Sha256::digest(format!("{kind}:{id}").as_bytes());
    hex::encode(&digest[..8])
}

/// One member of a network definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NetworkMember {
    /// A literal CIDR with an optional comment
    Address {
        /// The CIDR this member covers
        address: IpCidr,
        /// An optional comment for this member
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    /// The token of another network definition
    Token(String),
}

/// One member of a service definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceMember {
    /// A literal protocol/port pair
    Entry {
        /// The protocol this member covers
        protocol: Protocol,
        /// The port or port range this member covers
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<PortRange>,
    },
    /// The name of another service definition
    Token(String),
}

/// The token definitions handed to target renderers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Definitions {
    /// Network definitions keyed by hashed token
    pub networks: BTreeMap<String, Vec<NetworkMember>>,
    /// Service definitions keyed by authored name
    pub services: BTreeMap<String, Vec<ServiceMember>>,
}

impl Definitions {
    /// Build the definitions reachable from a term list
    ///
    /// Negated terms get two synthetic entries holding the address space
    /// complement of their source/destination sets.
    ///
    /// # Arguments
    ///
    /// * `catalog` - The authored objects to resolve against
    /// * `terms` - The expanded terms the definitions must cover
    pub fn build(catalog: &Catalog, terms: &[ExpandedTerm]) -> Result<Definitions, ApiError> {
        let mut definitions = Definitions::default();
        // walk the nested closure of every network the terms reference
        let mut network_frontier: Vec<i64> = terms
            .iter()
            .flat_map(|term| {
                term.source_networks
                    .iter()
                    .chain(term.destination_networks.iter())
                    .copied()
            })
            .collect();
        let mut seen_networks = HashSet::new();
        while let Some(id) = network_frontier.pop() {
            if !seen_networks.insert(id) {
                continue;
            }
            let network = catalog.network(id)?;
            let mut members = Vec::with_capacity(network.addresses.len());
            for address in &network.addresses {
                match &address.entry {
                    NetworkEntry::Address { address, comment } => {
                        members.push(NetworkMember::Address {
                            address: *address,
                            comment: comment.clone(),
                        });
                    }
                    NetworkEntry::Nested { nested_network_id } => {
                        members.push(NetworkMember::Token(hashed_name(
                            "Network",
                            *nested_network_id,
                        )));
                        network_frontier.push(*nested_network_id);
                    }
                }
            }
            definitions
                .networks
                .insert(hashed_name("Network", id), members);
        }
        // add the synthetic complements for negated terms
        for term in terms {
            if term.negate_source_networks && !term.source_networks.is_empty() {
                let excluded = resolve::fetch_addresses(catalog, &term.source_networks)?;
                let complement = negate::complement(&excluded)?;
                definitions.networks.insert(
                    format!("{}src", hashed_name("PolicyTerm", term.id)),
                    complement
                        .into_iter()
                        .map(|address| NetworkMember::Address {
                            address,
                            comment: None,
                        })
                        .collect(),
                );
            }
            if term.negate_destination_networks && !term.destination_networks.is_empty() {
                let excluded = resolve::fetch_addresses(catalog, &term.destination_networks)?;
                let complement = negate::complement(&excluded)?;
                definitions.networks.insert(
                    format!("{}dst", hashed_name("PolicyTerm", term.id)),
                    complement
                        .into_iter()
                        .map(|address| NetworkMember::Address {
                            address,
                            comment: None,
                        })
                        .collect(),
                );
            }
        }
        // walk the nested closure of every service the terms reference
        let mut service_frontier: Vec<i64> = terms
            .iter()
            .flat_map(|term| {
                term.source_services
                    .iter()
                    .chain(term.destination_services.iter())
                    .copied()
            })
            .collect();
        let mut seen_services = HashSet::new();
        while let Some(id) = service_frontier.pop() {
            if !seen_services.insert(id) {
                continue;
            }
            let service = catalog.service(id)?;
            let mut members = Vec::with_capacity(service.entries.len());
            for entry in &service.entries {
                match &entry.entry {
                    ServiceEntryKind::Port { protocol, port } => {
                        members.push(ServiceMember::Entry {
                            protocol: *protocol,
                            port: *port,
                        });
                    }
                    ServiceEntryKind::Nested { nested_service_id } => {
                        let nested = catalog.service(*nested_service_id)?;
                        members.push(ServiceMember::Token(nested.name.clone()));
                        service_frontier.push(*nested_service_id);
                    }
                }
            }
            definitions.services.insert(service.name.clone(), members);
        }
        Ok(definitions)
    }

    /// Resolve a network token to its flat CIDR list
    ///
    /// # Arguments
    ///
    /// * `token` - The network token to resolve
    #[must_use]
    pub fn resolve_network(&self, token: &str) -> Vec<IpCidr> {
        let mut cidrs = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![token.to_owned()];
        while let Some(token) = frontier.pop() {
            if !seen.insert(token.clone()) {
                continue;
            }
            if let Some(members) = self.networks.get(&token) {
                for member in members {
                    match member {
                        NetworkMember::Address { address, .. } => cidrs.push(*address),
                        NetworkMember::Token(nested) => frontier.push(nested.clone()),
                    }
                }
            }
        }
        cidrs
    }

    /// Resolve a service name to its flat protocol/port list
    ///
    /// # Arguments
    ///
    /// * `name` - The service name to resolve
    #[must_use]
    pub fn resolve_service(&self, name: &str) -> Vec<(Protocol, Option<PortRange>)> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![name.to_owned()];
        while let Some(name) = frontier.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(members) = self.services.get(&name) {
                for member in members {
                    match member {
                        ServiceMember::Entry { protocol, port } => entries.push((*protocol, *port)),
                        ServiceMember::Token(nested) => frontier.push(nested.clone()),
                    }
                }
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Network, NetworkAddress, Service, ServiceEntry};
    use chrono::Utc;
    use std::str::FromStr;

    #[test]
    fn hashed_names_are_stable_and_kind_scoped() {
        let first = hashed_name("Network", 7);
        assert_eq!(first, hashed_name("Network", 7));
        assert_ne!(first, hashed_name("Service", 7));
        assert_ne!(first, hashed_name("Network", 8));
        // tokens are 8 bytes of hex
        assert_eq!(first.len(), 16);
    }

    /// build a catalog with a nested network and service for tests
    fn catalog() -> Catalog {
        let inner = Network {
            id: 1,
            name: "inner".to_owned(),
            addresses: vec![NetworkAddress {
                id: 1,
                entry: NetworkEntry::Address {
                    address: IpCidr::from_str("10.0.0.0/24").unwrap(),
                    comment: Some("lab".to_owned()),
                },
            }],
            created: Utc::now(),
        };
        let outer = Network {
            id: 2,
            name: "outer".to_owned(),
            addresses: vec![NetworkAddress {
                id: 2,
                entry: NetworkEntry::Nested {
                    nested_network_id: 1,
                },
            }],
            created: Utc::now(),
        };
        let web = Service {
            id: 1,
            name: "web".to_owned(),
            entries: vec![ServiceEntry {
                id: 1,
                entry: ServiceEntryKind::Port {
                    protocol: Protocol::Tcp,
                    port: Some(PortRange::single(80)),
                },
            }],
            created: Utc::now(),
        };
        let apps = Service {
            id: 2,
            name: "apps".to_owned(),
            entries: vec![ServiceEntry {
                id: 2,
                entry: ServiceEntryKind::Nested {
                    nested_service_id: 1,
                },
            }],
            created: Utc::now(),
        };
        Catalog::new(vec![inner, outer], vec![web, apps], vec![])
    }

    /// build an expanded term for tests
    fn term(sources: Vec<i64>, services: Vec<i64>) -> ExpandedTerm {
        ExpandedTerm {
            id: 1,
            policy_id: 1,
            name: "t".to_owned(),
            valid_name: "p-t".to_owned(),
            enabled: true,
            action: crate::models::TermAction::Accept,
            option: None,
            logging: false,
            negate_source_networks: false,
            negate_destination_networks: false,
            source_networks: sources,
            destination_networks: vec![],
            source_services: vec![],
            destination_services: services,
        }
    }

    #[test]
    fn nested_networks_resolve_through_tokens() {
        let catalog = catalog();
        let defs = Definitions::build(&catalog, &[term(vec![2], vec![])]).unwrap();
        // both the outer and nested inner definitions are present
        assert!(defs.networks.contains_key(&hashed_name("Network", 2)));
        assert!(defs.networks.contains_key(&hashed_name("Network", 1)));
        let cidrs = defs.resolve_network(&hashed_name("Network", 2));
        assert_eq!(cidrs, vec![IpCidr::from_str("10.0.0.0/24").unwrap()]);
    }

    #[test]
    fn nested_services_resolve_through_names() {
        let catalog = catalog();
        let defs = Definitions::build(&catalog, &[term(vec![], vec![2])]).unwrap();
        assert!(defs.services.contains_key("apps"));
        assert!(defs.services.contains_key("web"));
        let entries = defs.resolve_service("apps");
        assert_eq!(entries, vec![(Protocol::Tcp, Some(PortRange::single(80)))]);
    }

    #[test]
    fn negated_terms_get_synthetic_complements() {
        let catalog = catalog();
        let mut negated = term(vec![1], vec![]);
        negated.negate_source_networks = true;
        let defs = Definitions::build(&catalog, &[negated]).unwrap();
        let token = format!("{}src", hashed_name("PolicyTerm", 1));
        let complement = defs.resolve_network(&token);
        // the complement never includes the excluded network
        assert!(!complement.contains(&IpCidr::from_str("10.0.0.0/24").unwrap()));
        assert!(!complement.is_empty());
        assert!(complement.iter().all(|cidr| cidr.is_ipv4()));
    }
}
