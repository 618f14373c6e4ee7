//! The structures for policy tests and their cases

use chrono::{DateTime, Utc};
use cidr::IpCidr;
use utoipa::ToSchema;

use super::{Protocol, TermAction};
use crate::compile::ExpandedTerm;

/// A concrete value or the wildcard "any"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard<T> {
    /// Match anything on this field
    Any,
    /// Match this specific value
    Value(T),
}

impl<T> Wildcard<T> {
    /// Get the concrete value if one is set
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Wildcard::Any => None,
            Wildcard::Value(value) => Some(value),
        }
    }

    /// Whether this field is the wildcard
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Wildcard::Any)
    }
}

impl<T> Default for Wildcard<T> {
    /// Default omitted fields to the wildcard
    fn default() -> Self {
        Wildcard::Any
    }
}

impl<T: serde::Serialize> serde::Serialize for Wildcard<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Wildcard::Any => serializer.serialize_str("any"),
            Wildcard::Value(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: serde::de::DeserializeOwned> serde::Deserialize<'de> for Wildcard<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // nulls and the literal string "any" are both wildcards
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Null => Ok(Wildcard::Any),
            serde_json::Value::String(raw) if raw.eq_ignore_ascii_case("any") => Ok(Wildcard::Any),
            _ => T::deserialize(value)
                .map(Wildcard::Value)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl<T> utoipa::ToSchema for Wildcard<T> {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Wildcard")
    }
}

impl<T> utoipa::__dev::ComposeSchema for Wildcard<T> {
    fn compose(
        _: Vec<utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>>,
    ) -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::schema::ObjectBuilder::new()
            .description(Some("A concrete value or the wildcard \"any\""))
            .into()
    }
}

/// A simulated packet and the action it should hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyTestCase {
    /// The id of this case
    pub id: i64,
    /// The action the matching term must carry
    pub expected_action: TermAction,
    /// The source network of the simulated packet
    #[serde(default)]
    #[schema(value_type = String)]
    pub source_network: Wildcard<IpCidr>,
    /// The destination network of the simulated packet
    #[serde(default)]
    #[schema(value_type = String)]
    pub destination_network: Wildcard<IpCidr>,
    /// The source port of the simulated packet
    #[serde(default)]
    pub source_port: Wildcard<u16>,
    /// The destination port of the simulated packet
    #[serde(default)]
    pub destination_port: Wildcard<u16>,
    /// The protocol of the simulated packet
    #[serde(default)]
    pub protocol: Wildcard<Protocol>,
}

/// A named set of cases covering policies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyTest {
    /// The id of this test
    pub id: i64,
    /// The unique name of this test
    pub name: String,
    /// A comment describing this test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The policies this test covers
    #[serde(default)]
    pub policies: Vec<i64>,
    /// The dynamic policies this test covers
    #[serde(default)]
    pub dynamic_policies: Vec<i64>,
    /// The cases in this test
    pub cases: Vec<PolicyTestCase>,
    /// When this test was created
    pub created: DateTime<Utc>,
}

/// A request to create or replace a test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyTestCaseRequest {
    /// The action the matching term must carry
    pub expected_action: TermAction,
    /// The source network of the simulated packet
    #[serde(default)]
    #[schema(value_type = String)]
    pub source_network: Wildcard<IpCidr>,
    /// The destination network of the simulated packet
    #[serde(default)]
    #[schema(value_type = String)]
    pub destination_network: Wildcard<IpCidr>,
    /// The source port of the simulated packet
    #[serde(default)]
    pub source_port: Wildcard<u16>,
    /// The destination port of the simulated packet
    #[serde(default)]
    pub destination_port: Wildcard<u16>,
    /// The protocol of the simulated packet
    #[serde(default)]
    pub protocol: Wildcard<Protocol>,
}

/// A request to create or replace a test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyTestRequest {
    /// The unique name for this test
    pub name: String,
    /// A comment describing this test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The policies this test covers
    #[serde(default)]
    pub policies: Vec<i64>,
    /// The dynamic policies this test covers
    #[serde(default)]
    pub dynamic_policies: Vec<i64>,
    /// The cases for this test
    #[serde(default)]
    pub cases: Vec<PolicyTestCaseRequest>,
}

/// The outcome of running one test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TestCaseResult {
    /// The case that was simulated
    pub case: PolicyTestCase,
    /// Whether the case hit a term with the expected action
    pub passed: bool,
    /// The term the case matched if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_term: Option<ExpandedTerm>,
}

/// The outcome of running every test against a policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TestRunReport {
    /// The per case outcomes
    pub tests: Vec<TestCaseResult>,
    /// The enabled terms no passing case selected
    pub not_matched_terms: Vec<ExpandedTerm>,
    /// The fraction of enabled terms selected by passing cases
    pub coverage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wildcards_deserialize_from_any_and_null() {
        let any: Wildcard<u16> = serde_json::from_str("\"any\"").unwrap();
        assert!(any.is_any());
        let any: Wildcard<u16> = serde_json::from_str("null").unwrap();
        assert!(any.is_any());
        let port: Wildcard<u16> = serde_json::from_str("443").unwrap();
        assert_eq!(port.value(), Some(&443));
    }

    #[test]
    fn wildcards_serialize_back_to_any() {
        let raw = serde_json::to_string(&Wildcard::<u16>::Any).unwrap();
        assert_eq!(raw, "\"any\"");
        let raw = serde_json::to_string(&Wildcard::Value(80u16)).unwrap();
        assert_eq!(raw, "80");
    }

    #[test]
    fn cases_default_omitted_fields_to_any() {
        let case: PolicyTestCase =
            serde_json::from_str(r#"{"id": 1, "expected_action": "accept"}"#).unwrap();
        assert!(case.source_network.is_any());
        assert!(case.protocol.is_any());
        let case: PolicyTestCase = serde_json::from_str(
            r#"{"id": 2, "expected_action": "deny", "source_network": "10.0.0.0/24", "protocol": "tcp"}"#,
        )
        .unwrap();
        assert_eq!(
            case.source_network.value(),
            Some(&IpCidr::from_str("10.0.0.0/24").unwrap())
        );
        assert_eq!(case.protocol.value(), Some(&Protocol::Tcp));
    }
}
