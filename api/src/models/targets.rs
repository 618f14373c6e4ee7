//! The structures for compilation targets

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

/// The device grammars configs can be rendered into
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeneratorKind {
    /// Classic Cisco IOS extended ACLs
    Cisco,
    /// Cisco IOS
    CiscoIos,
    /// Cisco NX-OS
    CiscoNxos,
    /// Cisco IOS-XR
    CiscoXr,
    /// Cisco ASA
    CiscoAsa,
    /// Juniper firewall filters
    Juniper,
    /// Linux nftables
    Nftables,
}

impl GeneratorKind {
    /// The file extension rendered configs use for this generator
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            GeneratorKind::Cisco | GeneratorKind::CiscoIos => "acl",
            GeneratorKind::CiscoNxos => "nxacl",
            GeneratorKind::CiscoXr => "xacl",
            GeneratorKind::CiscoAsa => "asa",
            GeneratorKind::Juniper => "jcl",
            GeneratorKind::Nftables => "nft",
        }
    }

    /// Whether this generator can pull configs over http with a copy command
    #[must_use]
    pub fn supports_http_copy(self) -> bool {
        matches!(
            self,
            GeneratorKind::Cisco | GeneratorKind::CiscoIos | GeneratorKind::CiscoNxos
        )
    }
}

/// The address families a target filters
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InetMode {
    /// IPv4 only
    Inet,
    /// IPv6 only
    Inet6,
    /// Both IPv4 and IPv6
    Mixed,
}

impl Default for InetMode {
    /// Default to IPv4
    fn default() -> Self {
        InetMode::Inet
    }
}

/// A literal replacement applied to rendered configs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TargetSubstitution {
    /// The literal text to replace
    pub name: String,
    /// The text to replace it with
    pub value: String,
}

/// A device flavor that policies compile for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Target {
    /// The id of this target
    pub id: i64,
    /// The unique name of this target
    pub name: String,
    /// The grammar configs are rendered into
    pub generator: GeneratorKind,
    /// The address families this target filters
    #[serde(default)]
    pub inet_mode: InetMode,
    /// Literal replacements applied after rendering, in order
    #[serde(default)]
    pub substitutions: Vec<TargetSubstitution>,
    /// When this target was created
    pub created: DateTime<Utc>,
}

/// A request to create or replace a target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TargetRequest {
    /// The unique name for this target
    pub name: String,
    /// The grammar configs are rendered into
    pub generator: GeneratorKind,
    /// The address families this target filters
    #[serde(default)]
    pub inet_mode: InetMode,
    /// Literal replacements applied after rendering, in order
    #[serde(default)]
    pub substitutions: Vec<TargetSubstitution>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_serialize_snake_case() {
        let raw = serde_json::to_string(&GeneratorKind::CiscoNxos).unwrap();
        assert_eq!(raw, "\"cisco_nxos\"");
        let parsed: GeneratorKind = serde_json::from_str("\"nftables\"").unwrap();
        assert_eq!(parsed, GeneratorKind::Nftables);
    }

    #[test]
    fn extensions_follow_the_generator() {
        assert_eq!(GeneratorKind::Cisco.extension(), "acl");
        assert_eq!(GeneratorKind::Juniper.extension(), "jcl");
        assert_eq!(GeneratorKind::Nftables.extension(), "nft");
    }

    #[test]
    fn http_copy_is_cisco_only() {
        assert!(GeneratorKind::CiscoIos.supports_http_copy());
        assert!(GeneratorKind::CiscoNxos.supports_http_copy());
        assert!(!GeneratorKind::Juniper.supports_http_copy());
        assert!(!GeneratorKind::Nftables.supports_http_copy());
    }
}
