//! The structures for deployers

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use crate::utils::ApiError;

/// The delivery mechanisms a deployer can use
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
pub enum DeployMode {
    /// Commit configs into a git repository
    Git,
    /// Push configs onto devices over ssh
    Netmiko,
    /// Push nftables rules onto proxmox hosts over ssh
    ProxmoxNft,
}

/// Helps serde default ssh ports to 22
fn default_ssh_port() -> u16 {
    22
}

/// The mode specific settings for a deployer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeployerConfig {
    /// Settings for committing configs into a git repository
    Git {
        /// The ssh url of the repository to commit into
        repo_url: String,
        /// The branch to commit onto
        branch: String,
        /// The folder inside the repository to write configs under
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_path: Option<String>,
        /// The env var holding the ssh key to clone/push with
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_key_envvar: Option<String>,
    },
    /// Settings for pushing configs onto devices over ssh
    Netmiko {
        /// The device to connect to
        host: String,
        /// The port ssh is reachable on
        #[serde(default = "default_ssh_port")]
        port: u16,
        /// The user to connect as
        username: String,
        /// The env var holding the login password
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password_envvar: Option<String>,
        /// The env var holding the enable secret
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enable_envvar: Option<String>,
        /// The env var holding the ssh key to connect with
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_key_envvar: Option<String>,
    },
    /// Settings for pushing nftables rules onto proxmox hosts
    ProxmoxNft {
        /// The host to connect to
        host: String,
        /// The port ssh is reachable on
        #[serde(default = "default_ssh_port")]
        port: u16,
        /// The user to connect as
        username: String,
        /// The env var holding the login password
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password_envvar: Option<String>,
        /// The env var holding the ssh key to connect with
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_key_envvar: Option<String>,
    },
}

impl DeployerConfig {
    /// The deploy mode this config block belongs to
    #[must_use]
    pub fn mode(&self) -> DeployMode {
        match self {
            DeployerConfig::Git { .. } => DeployMode::Git,
            DeployerConfig::Netmiko { .. } => DeployMode::Netmiko,
            DeployerConfig::ProxmoxNft { .. } => DeployMode::ProxmoxNft,
        }
    }
}

/// A binding that knows how to push revision configs to one target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Deployer {
    /// The id of this deployer
    pub id: i64,
    /// The unique name of this deployer
    pub name: String,
    /// The delivery mechanism this deployer uses
    pub mode: DeployMode,
    /// The target whose configs this deployer pushes
    pub target_id: i64,
    /// The mode specific settings for this deployer
    pub config: DeployerConfig,
    /// When this deployer was created
    pub created: DateTime<Utc>,
}

/// A request to create or replace a deployer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DeployerRequest {
    /// The unique name for this deployer
    pub name: String,
    /// The delivery mechanism this deployer uses
    pub mode: DeployMode,
    /// The target whose configs this deployer pushes
    pub target_id: i64,
    /// The mode specific settings for this deployer
    pub config: DeployerConfig,
}

impl DeployerRequest {
    /// Make sure the config block agrees with the declared mode
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.config.mode() != self.mode {
            return Err(ApiError::invalid(
                "config",
                format!(
                    "config block is for mode {} but the deployer mode is {}",
                    self.config.mode(),
                    self.mode
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_blocks_are_tagged_by_type() {
        let raw = r#"{"type": "git", "repo_url": "git@example.org:acls.git", "branch": "main"}"#;
        let config: DeployerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.mode(), DeployMode::Git);
        let raw = r#"{"type": "netmiko", "host": "rtr1", "username": "deploy"}"#;
        let config: DeployerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.mode(), DeployMode::Netmiko);
        // ssh ports default to 22
        if let DeployerConfig::Netmiko { port, .. } = config {
            assert_eq!(port, 22);
        }
    }

    #[test]
    fn mismatched_modes_are_rejected() {
        let req = DeployerRequest {
            name: "edge-git".to_owned(),
            mode: DeployMode::Netmiko,
            target_id: 1,
            config: DeployerConfig::Git {
                repo_url: "git@example.org:acls.git".to_owned(),
                branch: "main".to_owned(),
                folder_path: None,
                ssh_key_envvar: None,
            },
        };
        assert!(req.validate().is_err());
    }
}
