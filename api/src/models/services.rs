//! The structures for services and their entries

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::utils::ApiError;

/// The protocols a service entry can carry
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// The TCP protocol
    Tcp,
    /// The UDP protocol
    Udp,
    /// The ICMP protocol
    Icmp,
}

/// A single port or an inclusive range of ports
///
/// Serialized as `"80"` or `"1024-2048"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    /// The first port in this range
    pub start: u16,
    /// The last port in this range
    pub end: u16,
}

impl PortRange {
    /// Build a range covering a single port
    #[must_use]
    pub fn single(port: u16) -> Self {
        PortRange {
            start: port,
            end: port,
        }
    }

    /// Check whether a port falls inside this range
    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortRange {
    type Err = ApiError;

    /// Parse a port range from `"80"` or `"1024-2048"`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse::<u16>()?;
                let end = end.trim().parse::<u16>()?;
                if start > end {
                    return Err(ApiError::invalid(
                        "port",
                        format!("port range start {start} is greater than end {end}"),
                    ));
                }
                Ok(PortRange { start, end })
            }
            None => Ok(PortRange::single(raw.trim().parse::<u16>()?)),
        }
    }
}

impl serde::Serialize for PortRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for PortRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // ports come in as either numbers or strings
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Number(num) => match num.as_u64() {
                Some(port) if port <= u64::from(u16::MAX) => {
                    Ok(PortRange::single(port as u16))
                }
                _ => Err(serde::de::Error::custom(format!(
                    "port {num} is out of range"
                ))),
            },
            serde_json::Value::String(raw) => {
                PortRange::from_str(&raw).map_err(|err| serde::de::Error::custom(err.to_string()))
            }
            _ => Err(serde::de::Error::custom("ports must be numbers or strings")),
        }
    }
}

impl utoipa::PartialSchema for PortRange {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::schema::ObjectBuilder::new()
            .description(Some("A port or inclusive port range like \"1024-2048\""))
            .into()
    }
}

impl utoipa::ToSchema for PortRange {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("PortRange")
    }
}

/// A single row inside a service
///
/// A row is either a protocol/port pair or a reference to another service
/// that gets flattened on expansion. Exactly one of the two shapes may be
/// set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum ServiceEntryKind {
    /// A literal protocol/port pair
    Port {
        /// The protocol this row covers
        protocol: Protocol,
        /// The port or port range this row covers
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<PortRange>,
    },
    /// A reference to another service
    Nested {
        /// The id of the service this row includes
        nested_service_id: i64,
    },
}

impl ServiceEntryKind {
    /// Get the nested service id if this entry is a nested reference
    #[must_use]
    pub fn nested_id(&self) -> Option<i64> {
        match self {
            ServiceEntryKind::Nested { nested_service_id } => Some(*nested_service_id),
            ServiceEntryKind::Port { .. } => None,
        }
    }

    /// Validate the protocol/port pairing rules
    ///
    /// ICMP rows may not carry a port while tcp/udp rows must.
    pub fn validate(&self) -> Result<(), ApiError> {
        if let ServiceEntryKind::Port { protocol, port } = self {
            match (protocol, port) {
                (Protocol::Icmp, Some(_)) => {
                    return Err(ApiError::invalid("port", "icmp entries cannot have a port"))
                }
                (Protocol::Tcp | Protocol::Udp, None) => {
                    return Err(ApiError::invalid(
                        "port",
                        format!("{protocol} entries require a port"),
                    ))
                }
                _ => (),
            }
        }
        Ok(())
    }
}

/// An entry row owned by a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServiceEntry {
    /// The id of this entry row
    pub id: i64,
    /// The protocol/port pair or nested reference in this row
    #[serde(flatten)]
    pub entry: ServiceEntryKind,
}

/// A named group of protocol/port pairs that policies can reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Service {
    /// The id of this service
    pub id: i64,
    /// The unique name of this service
    pub name: String,
    /// The ordered entry rows in this service
    pub entries: Vec<ServiceEntry>,
    /// When this service was created
    pub created: DateTime<Utc>,
}

impl Service {
    /// Get the nested service ids referenced by this service
    #[must_use]
    pub fn nested_ids(&self) -> Vec<i64> {
        self.entries
            .iter()
            .filter_map(|entry| entry.entry.nested_id())
            .collect()
    }
}

/// A request to create or replace a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServiceRequest {
    /// The unique name for this service
    pub name: String,
    /// The ordered entry rows for this service
    #[serde(default)]
    pub entries: Vec<ServiceEntryKind>,
}

/// The objects referencing a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServiceUsage {
    /// The ids of policies with terms using this service
    pub policies: Vec<i64>,
    /// The ids of services nesting this service
    pub services: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_ranges_round_trip() {
        let single = PortRange::from_str("443").unwrap();
        assert_eq!(single, PortRange::single(443));
        let range = PortRange::from_str("1024-2048").unwrap();
        assert_eq!(range.start, 1024);
        assert_eq!(range.end, 2048);
        assert_eq!(range.to_string(), "1024-2048");
        assert!(range.contains(1500));
        assert!(!range.contains(80));
    }

    #[test]
    fn inverted_port_ranges_are_rejected() {
        assert!(PortRange::from_str("2048-1024").is_err());
        assert!(PortRange::from_str("99999").is_err());
    }

    #[test]
    fn icmp_entries_cannot_have_ports() {
        let entry = ServiceEntryKind::Port {
            protocol: Protocol::Icmp,
            port: Some(PortRange::single(8)),
        };
        assert!(entry.validate().is_err());
        let entry = ServiceEntryKind::Port {
            protocol: Protocol::Icmp,
            port: None,
        };
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn tcp_entries_require_ports() {
        let entry = ServiceEntryKind::Port {
            protocol: Protocol::Tcp,
            port: None,
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn entries_deserialize_into_the_right_variant() {
        let port: ServiceEntryKind =
            serde_json::from_str(r#"{"protocol": "tcp", "port": "80"}"#).unwrap();
        assert!(matches!(port, ServiceEntryKind::Port { .. }));
        let nested: ServiceEntryKind =
            serde_json::from_str(r#"{"nested_service_id": 3}"#).unwrap();
        assert_eq!(nested.nested_id(), Some(3));
    }
}
