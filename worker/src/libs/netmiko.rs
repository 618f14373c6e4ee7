//! Pushes revision configs onto network devices over ssh

use aclforge::models::{revision_hash, Deployer, DeployerConfig, GeneratorKind, RevisionConfig};
use openssh::{KnownHosts, Session, SessionBuilder};
use std::time::Duration;
use tokio::time::timeout;

use super::git;
use super::logs::JobLog;
use super::Error;

/// How long to wait for a single remote command
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Map a generator kind onto a device type label
///
/// # Arguments
///
/// * `generator` - The generator to map
fn device_type(generator: GeneratorKind) -> Option<&'static str> {
    match generator {
        GeneratorKind::Cisco | GeneratorKind::CiscoIos => Some("cisco_ios"),
        GeneratorKind::CiscoNxos => Some("cisco_nxos"),
        GeneratorKind::CiscoXr => Some("cisco_xr"),
        GeneratorKind::CiscoAsa => Some("cisco_asa"),
        GeneratorKind::Juniper => Some("juniper_junos"),
        GeneratorKind::Nftables => None,
    }
}

/// Build the command that makes a device pull its config over http
///
/// # Arguments
///
/// * `api_url` - The external url devices can pull configs from
/// * `revision_id` - The revision being deployed
/// * `target_id` - The target whose config to pull
/// * `hash` - The blake2b hash authorising the pull
fn copy_command(api_url: &str, revision_id: i64, target_id: i64, hash: &str) -> String {
    format!("copy {api_url}/revisions/{revision_id}/raw_config/{target_id}/{hash} running-config")
}

/// A command session against a network device
struct DeviceSession {
    /// The ssh session commands run over
    session: Session,
}

impl DeviceSession {
    /// Send one command to the device and capture its output
    ///
    /// # Arguments
    ///
    /// * `command` - The command to send
    async fn send(&self, command: &str) -> Result<String, Error> {
        let output = timeout(READ_TIMEOUT, self.session.raw_command(command).output()).await??;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::new(format!(
                "Command '{command}' failed: {stderr}"
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Close this sessions ssh connection
    async fn close(self) -> Result<(), Error> {
        self.session.close().await?;
        Ok(())
    }
}

/// Push a revision config onto a device the way netmiko would
///
/// Cisco flavored targets pull the config over http with a single copy
/// command when an api url is configured; everything else gets the config
/// lines sent one at a time followed by a config save.
///
/// # Arguments
///
/// * `deployer` - The deployer this job runs for
/// * `revision_id` - The revision being deployed
/// * `config` - The revision config to push
/// * `api_url` - The external url devices can pull configs from
/// * `generator` - The generator of the bound target
/// * `log` - The captured log for this job
pub async fn deploy(
    deployer: &Deployer,
    revision_id: i64,
    config: &RevisionConfig,
    api_url: Option<&str>,
    generator: GeneratorKind,
    log: &mut JobLog,
) -> Result<(), Error> {
    let DeployerConfig::Netmiko {
        host,
        port,
        username,
        password_envvar,
        enable_envvar,
        ssh_key_envvar,
    } = &deployer.config
    else {
        return Err(Error::new("deployer is missing its netmiko config"));
    };
    // resolve the secrets from the configured env vars
    let password = password_envvar
        .as_deref()
        .and_then(|envvar| std::env::var(envvar).ok());
    let enable = enable_envvar
        .as_deref()
        .and_then(|envvar| std::env::var(envvar).ok());
    let ssh_key = ssh_key_envvar
        .as_deref()
        .and_then(|envvar| std::env::var(envvar).ok());
    if password.is_none() && ssh_key.is_none() {
        log.error("No password or SSH key found in environment variables.");
        return Err(Error::new(
            "No password or SSH key found in environment variables.",
        ));
    }
    match device_type(generator) {
        Some(device) => log.info(format!("Found device type from mapper: {device}")),
        None => log.info("No device type mapped, relying on the ssh transport"),
    }
    // connect over ssh, preferring key auth when a key is configured
    let mut builder = SessionBuilder::default();
    builder
        .user(username.clone())
        .port(*port)
        .known_hosts_check(KnownHosts::Accept)
        .connect_timeout(READ_TIMEOUT);
    let scratch_key = match &ssh_key {
        Some(key) => {
            let path = git::write_scratch_key(key)?;
            builder.keyfile(&path.path);
            Some(path)
        }
        None => {
            // password only devices need a key loaded in the agent instead
            log.info("No ssh key configured, falling back to agent auth");
            None
        }
    };
    log.info(format!("Connecting to {host}:{port} as {username}"));
    let session = timeout(READ_TIMEOUT, builder.connect(host)).await??;
    let device = DeviceSession { session };
    drop(scratch_key);
    // enter enable mode when an enable secret is configured
    if let Some(enable) = &enable {
        device.send(&format!("enable {enable}")).await?;
    }
    let privilege = device.send("show privilege").await?;
    if !privilege.contains("15") {
        log.error("Not in enable_mode, disconnecting.");
        device.close().await?;
        return Err(Error::new("Not in enable_mode, disconnecting."));
    }
    // cisco flavored devices can pull the config over http in one command
    if generator.supports_http_copy() && api_url.is_some() {
        let api_url = api_url.unwrap_or_default();
        log.info("Trying to get acl from remote API");
        let hash = revision_hash(&config.config);
        let output = device
            .send(&copy_command(api_url, revision_id, config.target_id, &hash))
            .await?;
        log.info(output);
    } else {
        // everything else gets the config one line at a time
        device.send("configure terminal").await?;
        for line in config.config.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let output = device.send(line).await?;
            if !output.is_empty() {
                log.info(output);
            }
        }
        device.send("end").await?;
    }
    // save the device config and disconnect
    let output = device.send("write memory").await?;
    log.info(output);
    device.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_commands_carry_the_pull_hash() {
        let command = copy_command("https://acl.example.org/api/v1", 7, 3, "deadbeef");
        assert_eq!(
            command,
            "copy https://acl.example.org/api/v1/revisions/7/raw_config/3/deadbeef running-config"
        );
    }

    #[test]
    fn cisco_flavors_map_to_device_types() {
        assert_eq!(device_type(GeneratorKind::Cisco), Some("cisco_ios"));
        assert_eq!(device_type(GeneratorKind::CiscoNxos), Some("cisco_nxos"));
        assert_eq!(device_type(GeneratorKind::Juniper), Some("juniper_junos"));
        assert_eq!(device_type(GeneratorKind::Nftables), None);
    }
}
