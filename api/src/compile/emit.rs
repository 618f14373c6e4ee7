//! Emits per protocol term records for the target renderers

use itertools::Itertools;
use std::collections::HashSet;

use super::{naming, Catalog, ExpandedTerm};
use crate::models::{DefaultAction, Protocol, ServiceEntryKind, TermAction, TermOption};
use crate::utils::ApiError;

/// One renderable record of a term
///
/// Terms that reference services fan out into one record per used protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct TermRecord {
    /// The name of this record
    pub name: String,
    /// The action this record takes
    pub action: TermAction,
    /// An extra match option for this record
    pub option: Option<TermOption>,
    /// Whether matches on this record are logged
    pub logging: bool,
    /// The protocol this record matches if any
    pub protocol: Option<Protocol>,
    /// The network tokens traffic may come from (empty means any)
    pub source_addresses: Vec<String>,
    /// The network tokens traffic may go to (empty means any)
    pub destination_addresses: Vec<String>,
    /// The service names traffic may come from (empty means any)
    pub source_ports: Vec<String>,
    /// The service names traffic may go to (empty means any)
    pub destination_ports: Vec<String>,
}

/// Recursively collect the protocols a service uses
///
/// # Arguments
///
/// * `catalog` - The authored objects to resolve against
/// * `service_id` - The service to collect protocols from
fn service_protocols(catalog: &Catalog, service_id: i64) -> Result<Vec<Protocol>, ApiError> {
    let mut protocols = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![service_id];
    while let Some(id) = frontier.pop() {
        if !seen.insert(id) {
            continue;
        }
        let service = catalog.service(id)?;
        for entry in &service.entries {
            match &entry.entry {
                ServiceEntryKind::Port { protocol, .. } => protocols.push(*protocol),
                ServiceEntryKind::Nested { nested_service_id } => {
                    frontier.push(*nested_service_id);
                }
            }
        }
    }
    Ok(protocols)
}

/// Emit the renderable records for a flat term list
///
/// Disabled terms are dropped here. Terms without services emit a single
/// protocol free record; terms with services emit one record per protocol in
/// the union of both service sides, with ports stripped for icmp.
///
/// # Arguments
///
/// * `catalog` - The authored objects to resolve against
/// * `policy_valid_name` - The valid name of the policy being compiled
/// * `terms` - The expanded terms to emit records for
/// * `default_action` - An optional terminal action to append
pub fn records(
    catalog: &Catalog,
    policy_valid_name: &str,
    terms: &[ExpandedTerm],
    default_action: Option<DefaultAction>,
) -> Result<Vec<TermRecord>, ApiError> {
    let mut records = Vec::with_capacity(terms.len());
    for term in terms {
        if !term.enabled {
            continue;
        }
        // negated sides collapse to their synthetic complement token
        let source_addresses = if term.source_networks.is_empty() {
            Vec::new()
        } else if term.negate_source_networks {
            vec![format!("{}src", naming::hashed_name("PolicyTerm", term.id))]
        } else {
            term.source_networks
                .iter()
                .map(|id| naming::hashed_name("Network", *id))
                .collect()
        };
        let destination_addresses = if term.destination_networks.is_empty() {
            Vec::new()
        } else if term.negate_destination_networks {
            vec![format!("{}dst", naming::hashed_name("PolicyTerm", term.id))]
        } else {
            term.destination_networks
                .iter()
                .map(|id| naming::hashed_name("Network", *id))
                .collect()
        };
        // services contribute their names and the union of their protocols
        let mut protocols = Vec::new();
        let mut source_ports = Vec::with_capacity(term.source_services.len());
        for service_id in &term.source_services {
            source_ports.push(catalog.service(*service_id)?.name.clone());
            protocols.extend(service_protocols(catalog, *service_id)?);
        }
        let mut destination_ports = Vec::with_capacity(term.destination_services.len());
        for service_id in &term.destination_services {
            destination_ports.push(catalog.service(*service_id)?.name.clone());
            protocols.extend(service_protocols(catalog, *service_id)?);
        }
        let base = TermRecord {
            name: term.valid_name.clone(),
            action: term.action,
            option: term.option,
            logging: term.logging,
            protocol: None,
            source_addresses,
            destination_addresses,
            source_ports,
            destination_ports,
        };
        if protocols.is_empty() {
            // no services means a single protocol free record
            records.push(base);
        } else {
            // dedupe and sort the protocol union for stable output
            for protocol in protocols.into_iter().sorted_unstable().dedup() {
                let mut record = base.clone();
                record.name = format!("{}-{}", term.valid_name, protocol);
                record.protocol = Some(protocol);
                // icmp has no ports
                if protocol == Protocol::Icmp {
                    record.source_ports.clear();
                    record.destination_ports.clear();
                }
                records.push(record);
            }
        }
    }
    // append the terminal default term if one was requested
    if let Some(default_action) = default_action {
        let suffix = match default_action.action() {
            TermAction::Accept => "Default-Accept",
            _ => "Default-Deny",
        };
        records.push(TermRecord {
            name: format!("{policy_valid_name}-{suffix}"),
            action: default_action.action(),
            option: None,
            logging: default_action.logs(),
            protocol: None,
            source_addresses: Vec::new(),
            destination_addresses: Vec::new(),
            source_ports: Vec::new(),
            destination_ports: Vec::new(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortRange, Service, ServiceEntry};
    use chrono::Utc;

    /// build a service for tests
    fn service(id: i64, name: &str, entries: Vec<ServiceEntryKind>) -> Service {
        Service {
            id,
            name: name.to_owned(),
            entries: entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| ServiceEntry {
                    id: index as i64 + 1,
                    entry,
                })
                .collect(),
            created: Utc::now(),
        }
    }

    /// build an expanded term for tests
    fn term(id: i64, name: &str) -> ExpandedTerm {
        ExpandedTerm {
            id,
            policy_id: 1,
            name: name.to_owned(),
            valid_name: format!("edge-{name}"),
            enabled: true,
            action: TermAction::Accept,
            option: None,
            logging: false,
            negate_source_networks: false,
            negate_destination_networks: false,
            source_networks: vec![],
            destination_networks: vec![],
            source_services: vec![],
            destination_services: vec![],
        }
    }

    #[test]
    fn terms_without_services_emit_one_record() {
        let catalog = Catalog::default();
        let records = records(&catalog, "edge", &[term(1, "plain")], None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "edge-plain");
        assert_eq!(records[0].protocol, None);
    }

    #[test]
    fn disabled_terms_are_dropped() {
        let catalog = Catalog::default();
        let mut disabled = term(1, "off");
        disabled.enabled = false;
        let records = records(&catalog, "edge", &[disabled], None).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn service_protocols_fan_out_per_protocol() {
        let multi = service(
            1,
            "multi",
            vec![
                ServiceEntryKind::Port {
                    protocol: Protocol::Tcp,
                    port: Some(PortRange::single(53)),
                },
                ServiceEntryKind::Port {
                    protocol: Protocol::Udp,
                    port: Some(PortRange::single(53)),
                },
            ],
        );
        let catalog = Catalog::new(vec![], vec![multi], vec![]);
        let mut dns = term(1, "dns");
        dns.destination_services = vec![1];
        let records = records(&catalog, "edge", &[dns], None).unwrap();
        let names: Vec<&str> = records.iter().map(|record| record.name.as_str()).collect();
        assert_eq!(names, vec!["edge-dns-tcp", "edge-dns-udp"]);
        assert_eq!(records[0].destination_ports, vec!["multi"]);
    }

    #[test]
    fn icmp_records_drop_their_ports() {
        let ping = service(
            1,
            "ping",
            vec![ServiceEntryKind::Port {
                protocol: Protocol::Icmp,
                port: None,
            }],
        );
        let web = service(
            2,
            "web",
            vec![ServiceEntryKind::Port {
                protocol: Protocol::Tcp,
                port: Some(PortRange::single(80)),
            }],
        );
        let catalog = Catalog::new(vec![], vec![ping, web], vec![]);
        let mut mixed = term(1, "mixed");
        mixed.destination_services = vec![1, 2];
        let records = records(&catalog, "edge", &[mixed], None).unwrap();
        // tcp keeps its ports while icmp drops them
        let tcp = records
            .iter()
            .find(|record| record.protocol == Some(Protocol::Tcp))
            .unwrap();
        assert!(!tcp.destination_ports.is_empty());
        let icmp = records
            .iter()
            .find(|record| record.protocol == Some(Protocol::Icmp))
            .unwrap();
        assert!(icmp.destination_ports.is_empty());
    }

    #[test]
    fn negated_terms_reference_their_synthetic_token() {
        let catalog = Catalog::default();
        let mut negated = term(7, "not-lab");
        negated.source_networks = vec![1];
        negated.negate_source_networks = true;
        let records = records(&catalog, "edge", &[negated], None).unwrap();
        assert_eq!(
            records[0].source_addresses,
            vec![format!("{}src", naming::hashed_name("PolicyTerm", 7))]
        );
    }

    #[test]
    fn default_actions_append_a_terminal_record() {
        let catalog = Catalog::default();
        let records = records(
            &catalog,
            "edge",
            &[term(1, "plain")],
            Some(DefaultAction::DenyLog),
        )
        .unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.name, "edge-Default-Deny");
        assert_eq!(last.action, TermAction::Deny);
        assert!(last.logging);
    }
}
