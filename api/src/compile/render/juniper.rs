//! Renders term records into juniper firewall filters

use super::super::{Definitions, TermRecord};
use crate::models::{PortRange, TermAction, TermOption};

/// Map a term action onto a juniper then clause
fn action(action: TermAction) -> &'static str {
    match action {
        TermAction::Accept => "accept",
        TermAction::Deny => "discard",
        TermAction::Next => "next term",
        TermAction::Reject => "reject",
        TermAction::RejectWithTcpRst => "reject tcp-reset",
    }
}

/// Render one side's ports as a juniper list
fn ports(names: &[String], defs: &Definitions) -> Vec<String> {
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
    rendered
}

/// Render records into a juniper firewall filter
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
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push_str(&format!("/* {line} */\n"));
        }
    }
    out.push_str(&format!("/* {header} */\n"));
    out.push_str("firewall {\n");
    out.push_str(&format!("    filter {filter_name} {{\n"));
    for record in records {
        out.push_str(&format!("        term {} {{\n", record.name));
        let mut from = String::new();
        if !record.source_addresses.is_empty() {
            from.push_str("                source-address {\n");
            for token in &record.source_addresses {
                for cidr in defs.resolve_network(token) {
                    from.push_str(&format!("                    {cidr};\n"));
                }
            }
            from.push_str("                }\n");
        }
        if !record.destination_addresses.is_empty() {
            from.push_str("                destination-address {\n");
            for token in &record.destination_addresses {
                for cidr in defs.resolve_network(token) {
                    from.push_str(&format!("                    {cidr};\n"));
                }
            }
            from.push_str("                }\n");
        }
        if let Some(protocol) = record.protocol {
            from.push_str(&format!("                protocol {protocol};\n"));
        }
        let source_ports = ports(&record.source_ports, defs);
        if !source_ports.is_empty() {
            from.push_str(&format!(
                "                source-port [ {} ];\n",
                source_ports.join(" ")
            ));
        }
        let destination_ports = ports(&record.destination_ports, defs);
        if !destination_ports.is_empty() {
            from.push_str(&format!(
                "                destination-port [ {} ];\n",
                destination_ports.join(" ")
            ));
        }
        if let Some(option) = record.option {
            let option = match option {
                TermOption::Established => "established",
                TermOption::IsFragment => "is-fragment",
                TermOption::TcpEstablished => "tcp-established",
                TermOption::TcpInitial => "tcp-initial",
            };
            from.push_str(&format!("                tcp-flags {option};\n"));
        }
        if !from.is_empty() {
            out.push_str("            from {\n");
            out.push_str(&from);
            out.push_str("            }\n");
        }
        out.push_str("            then {\n");
        if record.logging {
            out.push_str("                log;\n");
        }
        out.push_str(&format!("                {};\n", action(record.action)));
        out.push_str("            }\n");
        out.push_str("        }\n");
    }
    out.push_str("    }\n");
    out.push_str("}\n");
    out
}
