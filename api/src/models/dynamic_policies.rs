//! The structures for dynamic policies

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use super::TermAction;

/// The terminal action appended to a compiled dynamic policy
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
pub enum DefaultAction {
    /// Accept anything left over
    Accept,
    /// Accept and log anything left over
    AcceptLog,
    /// Deny anything left over
    Deny,
    /// Deny and log anything left over
    DenyLog,
}

impl DefaultAction {
    /// Whether this default action logs matches
    #[must_use]
    pub fn logs(self) -> bool {
        matches!(self, DefaultAction::AcceptLog | DefaultAction::DenyLog)
    }

    /// The plain term action for this default
    #[must_use]
    pub fn action(self) -> TermAction {
        match self {
            DefaultAction::Accept | DefaultAction::AcceptLog => TermAction::Accept,
            DefaultAction::Deny | DefaultAction::DenyLog => TermAction::Deny,
        }
    }
}

/// A policy whose terms are selected on the fly from CIDR and policy filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DynamicPolicy {
    /// The id of this dynamic policy
    pub id: i64,
    /// The unique name of this dynamic policy
    pub name: String,
    /// A comment describing this dynamic policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Only select terms with this action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_action: Option<TermAction>,
    /// The terminal action appended on compilation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<DefaultAction>,
    /// The networks whose address space filters term sources
    #[serde(default)]
    pub source_filters: Vec<i64>,
    /// The networks whose address space filters term destinations
    #[serde(default)]
    pub destination_filters: Vec<i64>,
    /// Only select terms from these policies
    #[serde(default)]
    pub policy_filters: Vec<i64>,
    /// The targets this dynamic policy compiles for
    #[serde(default)]
    pub targets: Vec<i64>,
    /// The tests covering this dynamic policy (filled in on reads)
    #[serde(default)]
    pub tests: Vec<i64>,
    /// Whether this dynamic policy changed since its last revision
    #[serde(default)]
    pub edited: bool,
    /// When this dynamic policy was created
    pub created: DateTime<Utc>,
}

impl DynamicPolicy {
    /// Build the externally visible name for this dynamic policy
    #[must_use]
    pub fn valid_name(&self) -> String {
        self.name.replace(' ', "-")
    }
}

/// A request to create or replace a dynamic policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DynamicPolicyRequest {
    /// The unique name for this dynamic policy
    pub name: String,
    /// A comment describing this dynamic policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Only select terms with this action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_action: Option<TermAction>,
    /// The terminal action appended on compilation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<DefaultAction>,
    /// The networks whose address space filters term sources
    #[serde(default)]
    pub source_filters: Vec<i64>,
    /// The networks whose address space filters term destinations
    #[serde(default)]
    pub destination_filters: Vec<i64>,
    /// Only select terms from these policies
    #[serde(default)]
    pub policy_filters: Vec<i64>,
    /// The targets this dynamic policy compiles for
    #[serde(default)]
    pub targets: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_actions_split_into_action_and_logging() {
        assert_eq!(DefaultAction::AcceptLog.action(), TermAction::Accept);
        assert!(DefaultAction::AcceptLog.logs());
        assert_eq!(DefaultAction::Deny.action(), TermAction::Deny);
        assert!(!DefaultAction::Deny.logs());
    }

    #[test]
    fn default_actions_serialize_kebab_case() {
        let raw = serde_json::to_string(&DefaultAction::DenyLog).unwrap();
        assert_eq!(raw, "\"deny-log\"");
    }
}
