//! The structures for policies and their terms

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use crate::utils::ApiError;

/// The action a term takes on matching traffic
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TermAction {
    /// Allow the traffic
    Accept,
    /// Silently drop the traffic
    Deny,
    /// Fall through to the next term
    Next,
    /// Drop the traffic and notify the sender
    Reject,
    /// Drop the traffic and send a TCP reset
    RejectWithTcpRst,
}

/// The extra match options a term can carry
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TermOption {
    /// Match established connections
    Established,
    /// Match packet fragments
    IsFragment,
    /// Match established TCP connections
    TcpEstablished,
    /// Match the first packet of a TCP connection
    TcpInitial,
}

/// The tactical fields of a filtering term
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct FilterTerm {
    /// Whether this term is compiled into configs
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    /// The action this term takes
    pub action: TermAction,
    /// An extra match option for this term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<TermOption>,
    /// Whether matches on this term are logged
    #[serde(default)]
    pub logging: bool,
    /// Whether the source side matches the complement of its networks
    #[serde(default)]
    pub negate_source_networks: bool,
    /// Whether the destination side matches the complement of its networks
    #[serde(default)]
    pub negate_destination_networks: bool,
    /// The networks traffic may come from (empty means any)
    #[serde(default)]
    pub source_networks: Vec<i64>,
    /// The networks traffic may go to (empty means any)
    #[serde(default)]
    pub destination_networks: Vec<i64>,
    /// The services traffic may come from (empty means any)
    #[serde(default)]
    pub source_services: Vec<i64>,
    /// The services traffic may go to (empty means any)
    #[serde(default)]
    pub destination_services: Vec<i64>,
}

impl FilterTerm {
    /// Validate the negation rules for this term
    ///
    /// A negate flag over an empty network list is silently cleared to match
    /// the authoring UI's expectations.
    pub fn validate(&mut self) -> Result<(), ApiError> {
        if self.negate_source_networks && self.source_networks.is_empty() {
            self.negate_source_networks = false;
        }
        if self.negate_destination_networks && self.destination_networks.is_empty() {
            self.negate_destination_networks = false;
        }
        Ok(())
    }
}

/// A reference to another policy spliced inline on expansion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NestedTerm {
    /// The id of the policy this term expands into
    pub nested_policy_id: i64,
}

/// The body of a policy term
///
/// A term either filters traffic itself or splices in another policy.
/// Exactly one of the two shapes may be set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum TermBody {
    /// A term that filters traffic
    Filter(FilterTerm),
    /// A term that splices in another policy
    Nested(NestedTerm),
}

impl TermBody {
    /// Get the nested policy id if this term is a nested reference
    #[must_use]
    pub fn nested_id(&self) -> Option<i64> {
        match self {
            TermBody::Nested(nested) => Some(nested.nested_policy_id),
            TermBody::Filter(_) => None,
        }
    }

    /// Get the tactical fields if this term filters traffic
    #[must_use]
    pub fn filter(&self) -> Option<&FilterTerm> {
        match self {
            TermBody::Filter(filter) => Some(filter),
            TermBody::Nested(_) => None,
        }
    }
}

/// One rule inside a policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyTerm {
    /// The id of this term
    pub id: i64,
    /// The name of this term, unique within its policy
    pub name: String,
    /// The body of this term
    #[serde(flatten)]
    pub body: TermBody,
}

impl PolicyTerm {
    /// Build the externally visible name for this term
    ///
    /// # Arguments
    ///
    /// * `policy_valid_name` - The valid name of the owning policy
    #[must_use]
    pub fn valid_name(&self, policy_valid_name: &str) -> String {
        format!("{}-{}", policy_valid_name, self.name.replace(' ', "-"))
    }
}

/// An ordered list of terms compiled into per target ACLs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Policy {
    /// The id of this policy
    pub id: i64,
    /// The unique name of this policy
    pub name: String,
    /// A comment describing this policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// A custom header line overriding the generated one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_header: Option<String>,
    /// Whether this policy changed since its last revision
    #[serde(default)]
    pub edited: bool,
    /// The ordered terms in this policy
    pub terms: Vec<PolicyTerm>,
    /// The targets this policy compiles for
    #[serde(default)]
    pub targets: Vec<i64>,
    /// The tests covering this policy (filled in on reads)
    #[serde(default)]
    pub tests: Vec<i64>,
    /// When this policy was created
    pub created: DateTime<Utc>,
}

impl Policy {
    /// Build the externally visible name for this policy
    #[must_use]
    pub fn valid_name(&self) -> String {
        self.name.replace(' ', "-")
    }

    /// Get the policy ids nested by this policy's terms
    #[must_use]
    pub fn nested_ids(&self) -> Vec<i64> {
        self.terms
            .iter()
            .filter_map(|term| term.body.nested_id())
            .collect()
    }
}

/// A request to create a term in a policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyTermRequest {
    /// The name of this term, unique within its policy
    pub name: String,
    /// The body of this term
    #[serde(flatten)]
    pub body: TermBody,
}

/// A request to create or replace a policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyRequest {
    /// The unique name for this policy
    pub name: String,
    /// A comment describing this policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// A custom header line overriding the generated one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_header: Option<String>,
    /// The ordered terms for this policy
    #[serde(default)]
    pub terms: Vec<PolicyTermRequest>,
    /// The targets this policy compiles for
    #[serde(default)]
    pub targets: Vec<i64>,
}

/// The objects referencing a policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PolicyUsage {
    /// The ids of policies nesting this policy in a term
    pub policies: Vec<i64>,
    /// The ids of dynamic policies filtering on this policy
    pub dynamic_policies: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_replace_spaces() {
        let term = PolicyTerm {
            id: 1,
            name: "allow web".to_owned(),
            body: TermBody::Filter(FilterTerm {
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
            }),
        };
        assert_eq!(term.valid_name("edge-policy"), "edge-policy-allow-web");
    }

    #[test]
    fn terms_deserialize_into_the_right_variant() {
        let nested: PolicyTerm =
            serde_json::from_str(r#"{"id": 1, "name": "shared", "nested_policy_id": 9}"#).unwrap();
        assert_eq!(nested.body.nested_id(), Some(9));
        let filter: PolicyTerm = serde_json::from_str(
            r#"{"id": 2, "name": "allow web", "action": "accept", "source_networks": [4]}"#,
        )
        .unwrap();
        let body = filter.body.filter().unwrap();
        assert_eq!(body.action, TermAction::Accept);
        assert_eq!(body.source_networks, vec![4]);
        assert!(body.enabled);
    }

    #[test]
    fn actions_serialize_kebab_case() {
        let raw = serde_json::to_string(&TermAction::RejectWithTcpRst).unwrap();
        assert_eq!(raw, "\"reject-with-tcp-rst\"");
        let opt = serde_json::to_string(&TermOption::TcpEstablished).unwrap();
        assert_eq!(opt, "\"tcp-established\"");
    }

    #[test]
    fn negate_flags_clear_over_empty_lists() {
        let mut term = FilterTerm {
            enabled: true,
            action: TermAction::Deny,
            option: None,
            logging: false,
            negate_source_networks: true,
            negate_destination_networks: true,
            source_networks: vec![1],
            destination_networks: vec![],
            source_services: vec![],
            destination_services: vec![],
        };
        term.validate().unwrap();
        assert!(term.negate_source_networks);
        assert!(!term.negate_destination_networks);
    }
}
