//! The structures for networks and their addresses

use chrono::{DateTime, Utc};
use cidr::IpCidr;
use utoipa::ToSchema;

/// A single row inside a network
///
/// A row is either a literal CIDR or a reference to another network that
/// gets flattened on expansion. Exactly one of the two shapes may be set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum NetworkEntry {
    /// A literal IPv4 or IPv6 CIDR
    Address {
        /// The CIDR this row covers
        #[schema(value_type = String)]
        address: IpCidr,
        /// An optional comment for this row
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    /// A reference to another network
    Nested {
        /// The id of the network this row includes
        nested_network_id: i64,
    },
}

impl NetworkEntry {
    /// Get the nested network id if this entry is a nested reference
    #[must_use]
    pub fn nested_id(&self) -> Option<i64> {
        match self {
            NetworkEntry::Nested { nested_network_id } => Some(*nested_network_id),
            NetworkEntry::Address { .. } => None,
        }
    }

    /// Get the literal CIDR if this entry is an address row
    #[must_use]
    pub fn address(&self) -> Option<&IpCidr> {
        match self {
            NetworkEntry::Address { address, .. } => Some(address),
            NetworkEntry::Nested { .. } => None,
        }
    }
}

/// An address row owned by a network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NetworkAddress {
    /// The id of this address row
    pub id: i64,
    /// The address or nested reference in this row
    #[serde(flatten)]
    pub entry: NetworkEntry,
}

/// A named group of addresses that policies can reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Network {
    /// The id of this network
    pub id: i64,
    /// The unique name of this network
    pub name: String,
    /// The ordered address rows in this network
    pub addresses: Vec<NetworkAddress>,
    /// When this network was created
    pub created: DateTime<Utc>,
}

impl Network {
    /// Get the ids of all address rows in this network
    #[must_use]
    pub fn address_ids(&self) -> Vec<i64> {
        self.addresses.iter().map(|addr| addr.id).collect()
    }

    /// Get the nested network ids referenced by this network
    #[must_use]
    pub fn nested_ids(&self) -> Vec<i64> {
        self.addresses
            .iter()
            .filter_map(|addr| addr.entry.nested_id())
            .collect()
    }
}

/// A request to create or replace a network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NetworkRequest {
    /// The unique name for this network
    pub name: String,
    /// The ordered address rows for this network
    #[serde(default)]
    pub addresses: Vec<NetworkEntry>,
}

/// The objects referencing a network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NetworkUsage {
    /// The ids of policies with terms using this network
    pub policies: Vec<i64>,
    /// The ids of dynamic policies filtering on this network
    pub dynamic_policies: Vec<i64>,
    /// The ids of networks nesting this network
    pub networks: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_deserialize_into_the_right_variant() {
        let addr: NetworkEntry =
            serde_json::from_str(r#"{"address": "10.0.0.0/24", "comment": "lab"}"#).unwrap();
        assert!(matches!(addr, NetworkEntry::Address { .. }));
        let nested: NetworkEntry = serde_json::from_str(r#"{"nested_network_id": 7}"#).unwrap();
        assert_eq!(nested.nested_id(), Some(7));
    }

    #[test]
    fn entries_reject_both_shapes_missing() {
        let bad = serde_json::from_str::<NetworkEntry>(r#"{"comment": "no address"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn bad_cidrs_are_rejected() {
        let bad = serde_json::from_str::<NetworkEntry>(r#"{"address": "10.0.0.0/33"}"#);
        assert!(bad.is_err());
    }
}
