//! Renders term records into cisco style extended ACLs

use cidr::IpCidr;

use super::super::{Definitions, TermRecord};
use crate::models::{PortRange, TermAction, TermOption};

/// Render a v4 address as cisco address/wildcard notation
fn v4_address(cidr: &cidr::Ipv4Cidr) -> String {
    if cidr.network_length() == 32 {
        format!("host {}", cidr.first_address())
    } else {
        // cisco wildcards are the inverted netmask
        let wildcard = u32::MAX
            .checked_shr(u32::from(cidr.network_length()))
            .unwrap_or(0);
        format!(
            "{} {}",
            cidr.first_address(),
            std::net::Ipv4Addr::from(wildcard)
        )
    }
}

/// Render one side's addresses, falling back to any
fn addresses(tokens: &[String], defs: &Definitions) -> Vec<String> {
    if tokens.is_empty() {
        return vec!["any".to_owned()];
    }
    let mut rendered = Vec::new();
    for token in tokens {
        for cidr in defs.resolve_network(token) {
            match cidr {
                IpCidr::V4(v4) => rendered.push(v4_address(&v4)),
                IpCidr::V6(v6) => rendered.push(format!("{v6}")),
            }
        }
    }
    if rendered.is_empty() {
        rendered.push("any".to_owned());
    }
    rendered
}

/// Render one side's ports as eq/range matchers
fn ports(names: &[String], defs: &Definitions) -> Vec<String> {
    let mut rendered = Vec::new();
    for name in names {
        for (_, range) in defs.resolve_service(name) {
            if let Some(PortRange { start, end }) = range {
                if start == end {
                    rendered.push(format!(" eq {start}"));
                } else {
                    rendered.push(format!(" range {start} {end}"));
                }
            }
        }
    }
    rendered
}

/// Map a term action onto a cisco rule keyword
fn action(action: TermAction) -> &'static str {
    match action {
        TermAction::Accept => "permit",
        // cisco has no reject so anything else denies
        TermAction::Deny | TermAction::Reject | TermAction::RejectWithTcpRst => "deny",
        TermAction::Next => "permit",
    }
}

/// Render records into a cisco extended ACL
///
/// # Arguments
///
/// * `filter_name` - The external name of the rendered filter
/// * `comment` - The policy comment to embed
/// * `header` - The header line built by the compiler
/// * `records` - The records to render
/// * `defs` - The naming table the records reference
pub fn render(
    filter_name: &str,
    comment: Option<&str>,
    header: &str,
    records: &[TermRecord],
    defs: &Definitions,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("! {filter_name} {header}\n"));
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push_str(&format!("! {line}\n"));
        }
    }
    out.push_str(&format!("no ip access-list extended {filter_name}\n"));
    out.push_str(&format!("ip access-list extended {filter_name}\n"));
    for record in records {
        out.push_str(&format!(" remark {}\n", record.name));
        let protocol = record
            .protocol
            .map_or_else(|| "ip".to_owned(), |proto| proto.to_string());
        let sources = addresses(&record.source_addresses, defs);
        let destinations = addresses(&record.destination_addresses, defs);
        // empty port lists still emit one matcher free line
        let mut source_ports = ports(&record.source_ports, defs);
        if source_ports.is_empty() {
            source_ports.push(String::new());
        }
        let mut destination_ports = ports(&record.destination_ports, defs);
        if destination_ports.is_empty() {
            destination_ports.push(String::new());
        }
        let suffix = match record.option {
            Some(TermOption::Established | TermOption::TcpEstablished) => " established",
            Some(TermOption::IsFragment) => " fragments",
            _ => "",
        };
        let log = if record.logging { " log" } else { "" };
        for source in &sources {
            for sport in &source_ports {
                for destination in &destinations {
                    for dport in &destination_ports {
                        out.push_str(&format!(
                            " {} {} {}{} {}{}{}{}\n",
                            action(record.action),
                            protocol,
                            source,
                            sport,
                            destination,
                            dport,
                            suffix,
                            log
                        ));
                    }
                }
            }
        }
    }
    out.push_str("exit\n");
    out
}
