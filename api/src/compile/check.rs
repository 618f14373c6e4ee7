//! Classifies test packets against compiled policies and scores coverage

use cidr::IpCidr;
use std::collections::HashSet;

use super::{Definitions, ExpandedTerm, TermRecord};
use crate::models::{
    PolicyTest, PolicyTestCase, Protocol, TermAction, TestCaseResult, TestRunReport, Wildcard,
};

/// How well a record matched one dimension of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    /// The record is certain to match this dimension
    Exact,
    /// The packet left this dimension unspecified so a match is not certain
    Possible,
    /// The record cannot match this dimension
    No,
}

impl Match {
    /// Combine two dimension outcomes
    fn and(self, other: Match) -> Match {
        match (self, other) {
            (Match::No, _) | (_, Match::No) => Match::No,
            (Match::Possible, _) | (_, Match::Possible) => Match::Possible,
            (Match::Exact, Match::Exact) => Match::Exact,
        }
    }
}

/// Whether one CIDR falls entirely inside another
fn within(inner: &IpCidr, outer: &IpCidr) -> bool {
    match (inner, outer) {
        (IpCidr::V4(inner), IpCidr::V4(outer)) => {
            u32::from(outer.first_address()) <= u32::from(inner.first_address())
                && u32::from(inner.last_address()) <= u32::from(outer.last_address())
        }
        (IpCidr::V6(inner), IpCidr::V6(outer)) => {
            u128::from(outer.first_address()) <= u128::from(inner.first_address())
                && u128::from(inner.last_address()) <= u128::from(outer.last_address())
        }
        _ => false,
    }
}

/// Score an address dimension of a record against a packet field
fn match_address(
    tokens: &[String],
    defs: &Definitions,
    field: &Wildcard<IpCidr>,
) -> Match {
    // an unconstrained record side matches anything
    if tokens.is_empty() {
        return Match::Exact;
    }
    match field.value() {
        // the packet left this side open so the match is uncertain
        None => Match::Possible,
        Some(cidr) => {
            let covered = tokens
                .iter()
                .flat_map(|token| defs.resolve_network(token))
                .any(|resolved| within(cidr, &resolved));
            if covered {
                Match::Exact
            } else {
                Match::No
            }
        }
    }
}

/// Score a port dimension of a record against a packet field
fn match_port(names: &[String], defs: &Definitions, field: &Wildcard<u16>) -> Match {
    if names.is_empty() {
        return Match::Exact;
    }
    match field.value() {
        None => Match::Possible,
        Some(port) => {
            let covered = names
                .iter()
                .flat_map(|name| defs.resolve_service(name))
                .any(|(_, range)| range.is_some_and(|range| range.contains(*port)));
            if covered {
                Match::Exact
            } else {
                Match::No
            }
        }
    }
}

/// Score the protocol dimension of a record against a packet field
fn match_protocol(protocol: Option<Protocol>, field: &Wildcard<Protocol>) -> Match {
    match protocol {
        None => Match::Exact,
        Some(protocol) => match field.value() {
            None => Match::Possible,
            Some(packet) if *packet == protocol => Match::Exact,
            Some(_) => Match::No,
        },
    }
}

/// Find the first record certain to match a packet
///
/// Records are scanned in order. Uncertain matches are skipped over and a
/// certain match ends the scan unless its action is `next`, which falls
/// through to the following records.
///
/// # Arguments
///
/// * `records` - The compiled records to classify against
/// * `defs` - The naming table the records reference
/// * `case` - The packet to classify
#[must_use]
pub fn classify<'a>(
    records: &'a [TermRecord],
    defs: &Definitions,
    case: &PolicyTestCase,
) -> Option<&'a TermRecord> {
    for record in records {
        let outcome = match_address(&record.source_addresses, defs, &case.source_network)
            .and(match_address(
                &record.destination_addresses,
                defs,
                &case.destination_network,
            ))
            .and(match_port(&record.source_ports, defs, &case.source_port))
            .and(match_port(
                &record.destination_ports,
                defs,
                &case.destination_port,
            ))
            .and(match_protocol(record.protocol, &case.protocol));
        if outcome == Match::Exact {
            // next terms fall through to the records after them
            if record.action == TermAction::Next {
                continue;
            }
            return Some(record);
        }
    }
    None
}

/// Run one case and map the hit record back to its expanded term
///
/// # Arguments
///
/// * `records` - The compiled records to classify against
/// * `defs` - The naming table the records reference
/// * `terms` - The expanded terms the records were emitted from
/// * `case` - The packet to classify
#[must_use]
pub fn run_case(
    records: &[TermRecord],
    defs: &Definitions,
    terms: &[ExpandedTerm],
    case: &PolicyTestCase,
) -> (bool, Option<ExpandedTerm>) {
    match classify(records, defs, case) {
        Some(record) if record.action == case.expected_action => {
            // per protocol records carry their terms name as a prefix
            let matched = terms
                .iter()
                .find(|term| record.name.starts_with(&term.valid_name))
                .cloned();
            (true, matched)
        }
        _ => (false, None),
    }
}

/// Run every test against a compiled policy and score coverage
///
/// Coverage counts the distinct enabled terms selected by passing cases
/// against all enabled terms.
///
/// # Arguments
///
/// * `records` - The compiled records to classify against
/// * `defs` - The naming table the records reference
/// * `terms` - The expanded terms the records were emitted from
/// * `tests` - The tests to run
#[must_use]
pub fn report(
    records: &[TermRecord],
    defs: &Definitions,
    terms: &[ExpandedTerm],
    tests: &[PolicyTest],
) -> TestRunReport {
    let mut results = Vec::new();
    for test in tests {
        for case in &test.cases {
            let (passed, matched_term) = run_case(records, defs, terms, case);
            results.push(TestCaseResult {
                case: case.clone(),
                passed,
                matched_term,
            });
        }
    }
    // score distinct matched terms against the enabled terms
    let matched: HashSet<i64> = results
        .iter()
        .filter_map(|result| result.matched_term.as_ref())
        .map(|term| term.id)
        .collect();
    let enabled: Vec<&ExpandedTerm> = terms.iter().filter(|term| term.enabled).collect();
    let mut seen = HashSet::new();
    let not_matched_terms: Vec<ExpandedTerm> = enabled
        .iter()
        .filter(|term| !matched.contains(&term.id) && seen.insert(term.id))
        .map(|term| (*term).clone())
        .collect();
    let distinct_enabled: HashSet<i64> = enabled.iter().map(|term| term.id).collect();
    let coverage = if distinct_enabled.is_empty() {
        0.0
    } else {
        let raw = matched.len() as f64 / distinct_enabled.len() as f64;
        // keep four decimals like the run_tests response always has
        (raw * 10_000.0).round() / 10_000.0
    };
    TestRunReport {
        tests: results,
        not_matched_terms,
        coverage,
    }
}

/// Build the message the coverage gate rejects with
///
/// # Arguments
///
/// * `coverage` - The coverage that fell short
#[must_use]
pub fn coverage_message(coverage: f64) -> String {
    format!(
        "Test coverage {}% is lower than the required 100%",
        (coverage * 100.0).round() as i64
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::naming::NetworkMember;
    use crate::models::{PortRange, TermOption};
    use chrono::Utc;
    use std::str::FromStr;

    /// build a record for tests
    fn record(name: &str, action: TermAction) -> TermRecord {
        TermRecord {
            name: name.to_owned(),
            action,
            option: None,
            logging: false,
            protocol: None,
            source_addresses: vec![],
            destination_addresses: vec![],
            source_ports: vec![],
            destination_ports: vec![],
        }
    }

    /// build a case for tests
    fn case(expected: TermAction) -> PolicyTestCase {
        PolicyTestCase {
            id: 1,
            expected_action: expected,
            source_network: Wildcard::Any,
            destination_network: Wildcard::Any,
            source_port: Wildcard::Any,
            destination_port: Wildcard::Any,
            protocol: Wildcard::Any,
        }
    }

    /// build an expanded term for tests
    fn term(id: i64, valid_name: &str, enabled: bool) -> ExpandedTerm {
        ExpandedTerm {
            id,
            policy_id: 1,
            name: valid_name.to_owned(),
            valid_name: valid_name.to_owned(),
            enabled,
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

    /// definitions with one token covering 10.0.0.0/8
    fn defs() -> Definitions {
        let mut defs = Definitions::default();
        defs.networks.insert(
            "lab".to_owned(),
            vec![NetworkMember::Address {
                address: IpCidr::from_str("10.0.0.0/8").unwrap(),
                comment: None,
            }],
        );
        defs.services.insert(
            "web".to_owned(),
            vec![crate::compile::naming::ServiceMember::Entry {
                protocol: Protocol::Tcp,
                port: Some(PortRange::single(80)),
            }],
        );
        defs
    }

    #[test]
    fn constrained_records_are_skipped_for_wildcard_packets() {
        // the first record constrains its source but the packet says any
        let mut constrained = record("edge-lab-only", TermAction::Deny);
        constrained.source_addresses = vec!["lab".to_owned()];
        let open = record("edge-open", TermAction::Accept);
        let records = vec![constrained, open];
        let hit = classify(&records, &defs(), &case(TermAction::Accept)).unwrap();
        assert_eq!(hit.name, "edge-open");
    }

    #[test]
    fn packets_inside_the_source_match_exactly() {
        let mut constrained = record("edge-lab-only", TermAction::Deny);
        constrained.source_addresses = vec!["lab".to_owned()];
        let records = vec![constrained, record("edge-open", TermAction::Accept)];
        let mut packet = case(TermAction::Deny);
        packet.source_network = Wildcard::Value(IpCidr::from_str("10.1.0.0/24").unwrap());
        let hit = classify(&records, &defs(), &packet).unwrap();
        assert_eq!(hit.name, "edge-lab-only");
        // a packet outside the source falls through
        packet.source_network = Wildcard::Value(IpCidr::from_str("192.168.0.0/24").unwrap());
        let hit = classify(&records, &defs(), &packet).unwrap();
        assert_eq!(hit.name, "edge-open");
    }

    #[test]
    fn ports_and_protocols_constrain_matches() {
        let mut web = record("edge-web-tcp", TermAction::Accept);
        web.protocol = Some(Protocol::Tcp);
        web.destination_ports = vec!["web".to_owned()];
        let fallback = record("edge-deny", TermAction::Deny);
        let records = vec![web, fallback];
        let mut packet = case(TermAction::Accept);
        packet.protocol = Wildcard::Value(Protocol::Tcp);
        packet.destination_port = Wildcard::Value(80);
        let hit = classify(&records, &defs(), &packet).unwrap();
        assert_eq!(hit.name, "edge-web-tcp");
        // the wrong port falls through to the deny
        packet.destination_port = Wildcard::Value(22);
        let hit = classify(&records, &defs(), &packet).unwrap();
        assert_eq!(hit.name, "edge-deny");
    }

    #[test]
    fn next_actions_fall_through() {
        let records = vec![
            record("edge-peek", TermAction::Next),
            record("edge-allow", TermAction::Accept),
        ];
        let hit = classify(&records, &defs(), &case(TermAction::Accept)).unwrap();
        assert_eq!(hit.name, "edge-allow");
    }

    #[test]
    fn coverage_is_distinct_matched_over_enabled() {
        let terms = vec![
            term(1, "edge-one", true),
            term(2, "edge-two", true),
            term(3, "edge-three", true),
        ];
        let records = vec![
            record("edge-one", TermAction::Accept),
            record("edge-two", TermAction::Deny),
            record("edge-three", TermAction::Accept),
        ];
        // one passing case hits term one and a failing case hits nothing
        let tests = vec![PolicyTest {
            id: 1,
            name: "smoke".to_owned(),
            comment: None,
            policies: vec![1],
            dynamic_policies: vec![],
            cases: vec![case(TermAction::Accept), case(TermAction::Deny)],
            created: Utc::now(),
        }];
        let report = report(&records, &defs(), &terms, &tests);
        assert_eq!(report.coverage, 0.3333);
        assert_eq!(report.not_matched_terms.len(), 2);
        assert!(report.tests[0].passed);
        assert!(!report.tests[1].passed);
    }

    #[test]
    fn disabled_terms_are_outside_the_denominator() {
        let terms = vec![term(1, "edge-on", true), term(2, "edge-off", false)];
        let records = vec![record("edge-on", TermAction::Accept)];
        let tests = vec![PolicyTest {
            id: 1,
            name: "smoke".to_owned(),
            comment: None,
            policies: vec![1],
            dynamic_policies: vec![],
            cases: vec![case(TermAction::Accept)],
            created: Utc::now(),
        }];
        let run = report(&records, &defs(), &terms, &tests);
        assert_eq!(run.coverage, 1.0);
        assert!(run.not_matched_terms.is_empty());
    }

    #[test]
    fn gate_messages_round_to_whole_percents() {
        assert_eq!(
            coverage_message(0.6667),
            "Test coverage 67% is lower than the required 100%"
        );
        assert_eq!(
            coverage_message(0.5),
            "Test coverage 50% is lower than the required 100%"
        );
    }

    #[test]
    fn term_options_ride_along_on_records() {
        // options do not affect classification but must survive emission
        let mut record = record("edge-established", TermAction::Accept);
        record.option = Some(TermOption::TcpEstablished);
        assert_eq!(record.option, Some(TermOption::TcpEstablished));
    }
}
