//! The structures for revisions and their frozen configs

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use crate::utils::ApiError;

/// The policy a revision snapshots
///
/// Exactly one of the two shapes may be set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum RevisionSource {
    /// A snapshot of an authored policy
    Policy {
        /// The id of the snapshotted policy
        policy_id: i64,
    },
    /// A snapshot of a dynamic policy
    DynamicPolicy {
        /// The id of the snapshotted dynamic policy
        dynamic_policy_id: i64,
    },
}

/// The rendered config for one target inside a revision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RevisionConfig {
    /// The target this config was rendered for
    pub target_id: i64,
    /// The external name of the rendered filter
    pub filter_name: String,
    /// The filename this config deploys as
    pub filename: String,
    /// The rendered config text
    pub config: String,
}

/// An immutable snapshot of a policy and its rendered configs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Revision {
    /// The id of this revision
    pub id: i64,
    /// A comment describing this revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The policy this revision snapshots
    #[serde(flatten)]
    pub source: RevisionSource,
    /// The frozen policy snapshot
    #[schema(value_type = Object)]
    pub json_data: serde_json::Value,
    /// The frozen expanded term list
    #[schema(value_type = Object)]
    pub expanded_terms: serde_json::Value,
    /// The rendered configs for each target
    pub configs: Vec<RevisionConfig>,
    /// When this revision was created
    pub created: DateTime<Utc>,
}

/// A request to create a revision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RevisionRequest {
    /// A comment describing this revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The policy to snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<i64>,
    /// The dynamic policy to snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_policy_id: Option<i64>,
}

impl RevisionRequest {
    /// Validate that exactly one source is set and return it
    pub fn source(&self) -> Result<RevisionSource, ApiError> {
        match (self.policy_id, self.dynamic_policy_id) {
            (Some(policy_id), None) => Ok(RevisionSource::Policy { policy_id }),
            (None, Some(dynamic_policy_id)) => {
                Ok(RevisionSource::DynamicPolicy { dynamic_policy_id })
            }
            _ => Err(ApiError::invalid(
                "policy_id",
                "exactly one of policy_id or dynamic_policy_id must be set",
            )),
        }
    }
}

/// Build the hash that authorises pulling a raw config over http
///
/// # Arguments
///
/// * `config` - The rendered config text to hash
#[must_use]
pub fn revision_hash(config: &str) -> String {
    use blake2::digest::{Update, VariableOutput};
    // blake2b with a 16 byte digest
    let mut hasher = blake2::Blake2bVar::new(16).expect("16 is a valid blake2b digest size");
    hasher.update(config.as_bytes());
    let mut digest = [0u8; 16];
    hasher
        .finalize_variable(&mut digest)
        .expect("digest buffer matches the configured size");
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_require_exactly_one_source() {
        let both = RevisionRequest {
            comment: None,
            policy_id: Some(1),
            dynamic_policy_id: Some(2),
        };
        assert!(both.source().is_err());
        let neither = RevisionRequest {
            comment: None,
            policy_id: None,
            dynamic_policy_id: None,
        };
        assert!(neither.source().is_err());
        let policy = RevisionRequest {
            comment: None,
            policy_id: Some(1),
            dynamic_policy_id: None,
        };
        assert_eq!(
            policy.source().unwrap(),
            RevisionSource::Policy { policy_id: 1 }
        );
    }

    #[test]
    fn revision_hashes_are_stable_blake2b_16() {
        let hash = revision_hash("ip access-list extended test\n");
        // 16 bytes hex encoded
        assert_eq!(hash.len(), 32);
        // hashing the same text twice gives the same digest
        assert_eq!(hash, revision_hash("ip access-list extended test\n"));
        // any change to the text changes the digest
        assert_ne!(hash, revision_hash("ip access-list extended other\n"));
    }

    #[test]
    fn sources_deserialize_into_the_right_variant() {
        let policy: RevisionSource = serde_json::from_str(r#"{"policy_id": 4}"#).unwrap();
        assert_eq!(policy, RevisionSource::Policy { policy_id: 4 });
        let dynamic: RevisionSource =
            serde_json::from_str(r#"{"dynamic_policy_id": 9}"#).unwrap();
        assert_eq!(
            dynamic,
            RevisionSource::DynamicPolicy {
                dynamic_policy_id: 9
            }
        );
    }
}
