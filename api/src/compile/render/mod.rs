//! Renders term records into device specific config text
//!
//! The grammars here are intentionally compact: the compiler treats the
//! renderer as a black box keyed by generator kind and only the nftables
//! table/hook lines are load bearing for the post processing contract.

mod cisco;
mod juniper;
mod nftables;

use super::{Definitions, TermRecord};
use crate::models::GeneratorKind;
use crate::utils::ApiError;

/// Render records into config text for a generator
///
/// # Arguments
///
/// * `generator` - The grammar to render into
/// * `filter_name` - The external name of the rendered filter
/// * `comment` - The policy comment to embed
/// * `header` - The header line built by the compiler
/// * `records` - The records to render
/// * `defs` - The naming table the records reference
pub fn render(
    generator: GeneratorKind,
    filter_name: &str,
    comment: Option<&str>,
    header: &str,
    records: &[TermRecord],
    defs: &Definitions,
) -> Result<String, ApiError> {
    let config = match generator {
        GeneratorKind::Cisco
        | GeneratorKind::CiscoIos
        | GeneratorKind::CiscoNxos
        | GeneratorKind::CiscoXr
        | GeneratorKind::CiscoAsa => cisco::render(filter_name, comment, header, records, defs),
        GeneratorKind::Juniper => juniper::render(filter_name, comment, header, records, defs),
        GeneratorKind::Nftables => nftables::render(filter_name, comment, header, records, defs),
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::naming::NetworkMember;
    use crate::models::TermAction;
    use cidr::IpCidr;
    use std::str::FromStr;

    /// definitions with one token for render tests
    fn defs() -> Definitions {
        let mut defs = Definitions::default();
        defs.networks.insert(
            "aabbccdd00112233".to_owned(),
            vec![NetworkMember::Address {
                address: IpCidr::from_str("10.0.0.0/8").unwrap(),
                comment: None,
            }],
        );
        defs
    }

    /// a record matching traffic from the lab token
    fn record() -> TermRecord {
        TermRecord {
            name: "edge-allow-lab".to_owned(),
            action: TermAction::Accept,
            option: None,
            logging: true,
            protocol: None,
            source_addresses: vec!["aabbccdd00112233".to_owned()],
            destination_addresses: vec![],
            source_ports: vec![],
            destination_ports: vec![],
        }
    }

    #[test]
    fn cisco_renders_an_extended_list() {
        let config = render(
            GeneratorKind::Cisco,
            "edge",
            Some("edge acl"),
            "extended",
            &[record()],
            &defs(),
        )
        .unwrap();
        assert!(config.contains("ip access-list extended edge"));
        assert!(config.contains("permit ip 10.0.0.0 0.255.255.255 any log"));
    }

    #[test]
    fn juniper_renders_a_filter_block() {
        let config = render(
            GeneratorKind::Juniper,
            "edge",
            None,
            "edge inet",
            &[record()],
            &defs(),
        )
        .unwrap();
        assert!(config.contains("filter edge {"));
        assert!(config.contains("term edge-allow-lab {"));
        assert!(config.contains("10.0.0.0/8;"));
    }

    #[test]
    fn nftables_renders_the_contracted_table_lines() {
        let config = render(
            GeneratorKind::Nftables,
            "edge",
            None,
            "inet input",
            &[record()],
            &defs(),
        )
        .unwrap();
        // these two lines are rewritten by the compilers post processing
        assert!(config.contains("table inet filtering_policies {"));
        assert!(config.contains("type filter hook input priority 0; policy drop;"));
        assert!(config.contains("ip saddr { 10.0.0.0/8 } log accept"));
    }
}
