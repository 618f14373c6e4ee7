//! Renders term records into nftables rulesets
//!
//! The table declaration and hook lines must stay byte identical to the
//! strings the compiler rewrites after rendering.

use cidr::IpCidr;

use super::super::{Definitions, TermRecord};
use crate::models::{PortRange, Protocol, TermAction};

/// Map a term action onto an nftables verdict
fn verdict(action: TermAction) -> &'static str {
    match action {
        TermAction::Accept => "accept",
        TermAction::Deny => "drop",
        TermAction::Next => "continue",
        TermAction::Reject => "reject",
        TermAction::RejectWithTcpRst => "reject with tcp reset",
    }
}

/// Split resolved CIDRs into v4 and v6 sets
fn split_families(tokens: &[String], defs: &Definitions) -> (Vec<String>, Vec<String>) {
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    for token in tokens {
        for cidr in defs.resolve_network(token) {
            match cidr {
                IpCidr::V4(net) => v4.push(net.to_string()),
                IpCidr::V6(net) => v6.push(net.to_string()),
            }
        }
    }
    (v4, v6)
}

/// Render one side's ports as an nftables set
fn port_set(names: &[String], defs: &Definitions) -> Option<String> {
    let mut rendered = Vec::new();
    for name in names {
        for (_, range) in defs.resolve_service(name) {
            if let Some(PortRange { start, end }) = range {
                if start == end {
                    rendered.push(format!("{start}"));
                } else {
                    rendered.push(format!("{start}-{end}"));
                }
            }
        }
    }
    if rendered.is_empty() {
        None
    } else {
        Some(format!("{{ {} }}", rendered.join(", ")))
    }
}

/// Render one rule line for a single address family
fn rule(
    record: &TermRecord,
    family: &str,
    sources: &[String],
    destinations: &[String],
    defs: &Definitions,
) -> String {
    let mut parts = Vec::new();
    if !sources.is_empty() {
        parts.push(format!("{family} saddr {{ {} }}", sources.join(", ")));
    }
    if !destinations.is_empty() {
        parts.push(format!("{family} daddr {{ {} }}", destinations.join(", ")));
    }
    if let Some(protocol) = record.protocol {
        match protocol {
            Protocol::Tcp | Protocol::Udp => {
                let sport = port_set(&record.source_ports, defs);
                let dport = port_set(&record.destination_ports, defs);
                if sport.is_none() && dport.is_none() {
                    parts.push(format!("meta l4proto {protocol}"));
                }
                if let Some(set) = sport {
                    parts.push(format!("{protocol} sport {set}"));
                }
                if let Some(set) = dport {
                    parts.push(format!("{protocol} dport {set}"));
                }
            }
            Protocol::Icmp => parts.push("meta l4proto icmp".to_owned()),
        }
    }
    if record.logging {
        parts.push("log".to_owned());
    }
    parts.push(verdict(record.action).to_owned());
    format!("        {}\n", parts.join(" "))
}

/// Render records into an nftables ruleset
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
    out.push_str(&format!("# {filter_name} {header}\n"));
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push_str(&format!("# {line}\n"));
        }
    }
    out.push_str("table inet filtering_policies {\n");
    out.push_str("    chain input {\n");
    out.push_str("        type filter hook input priority 0; policy drop;\n");
    for record in records {
        out.push_str(&format!("        # {}\n", record.name));
        let (src_v4, src_v6) = split_families(&record.source_addresses, defs);
        let (dst_v4, dst_v6) = split_families(&record.destination_addresses, defs);
        let has_v4 = !src_v4.is_empty() || !dst_v4.is_empty();
        let has_v6 = !src_v6.is_empty() || !dst_v6.is_empty();
        if has_v4 {
            out.push_str(&rule(record, "ip", &src_v4, &dst_v4, defs));
        }
        if has_v6 {
            out.push_str(&rule(record, "ip6", &src_v6, &dst_v6, defs));
        }
        if !has_v4 && !has_v6 {
            // address free records match either family
            out.push_str(&rule(record, "ip", &[], &[], defs));
        }
    }
    out.push_str("    }\n");
    out.push_str("}\n");
    out
}
