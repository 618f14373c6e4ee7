//! Pushes nftables rulesets onto proxmox hosts over ssh

use aclforge::models::{Deployer, DeployerConfig, RevisionConfig};
use openssh::{KnownHosts, SessionBuilder, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use super::git;
use super::logs::JobLog;
use super::Error;

/// How long to wait for a single remote command
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Push a revision config onto a proxmox host and load it into nftables
///
/// The ruleset is written under /opt/nft, validated with a check run and
/// then swapped in with an add/flush/load sequence. Any stderr from the
/// remote commands fails the job.
///
/// # Arguments
///
/// * `deployer` - The deployer this job runs for
/// * `config` - The revision config to push
/// * `log` - The captured log for this job
pub async fn deploy(
    deployer: &Deployer,
    config: &RevisionConfig,
    log: &mut JobLog,
) -> Result<(), Error> {
    let DeployerConfig::ProxmoxNft {
        host,
        port,
        username,
        password_envvar,
        ssh_key_envvar,
    } = &deployer.config
    else {
        return Err(Error::new("deployer is missing its proxmox nft config"));
    };
    // resolve the secrets from the configured env vars
    let ssh_key = ssh_key_envvar
        .as_deref()
        .and_then(|envvar| std::env::var(envvar).ok());
    if ssh_key.is_none() && password_envvar.is_some() {
        log.info("No ssh key configured, falling back to agent auth");
    }
    // connect over ssh
    let mut builder = SessionBuilder::default();
    builder
        .user(username.clone())
        .port(*port)
        .known_hosts_check(KnownHosts::Accept)
        .connect_timeout(READ_TIMEOUT);
    let scratch_key = match &ssh_key {
        Some(key) => {
            let key = git::write_scratch_key(key)?;
            builder.keyfile(&key.path);
            Some(key)
        }
        None => None,
    };
    log.info(format!("Connecting to {host}:{port} as {username}"));
    let session = timeout(READ_TIMEOUT, builder.connect(host)).await??;
    drop(scratch_key);
    let path = format!("/opt/nft/{}", config.filename);
    // stream the ruleset into its file on the remote host
    log.info(format!("Writing ruleset to {path}"));
    let mut child = session
        .shell(format!("mkdir -p /opt/nft && cat > {path}"))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .await?;
    // the handle must be dropped for the remote cat to see EOF
    if let Some(mut stdin) = child.stdin().take() {
        stdin.write_all(config.config.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    let written = timeout(READ_TIMEOUT, child.wait_with_output()).await??;
    let stderr = String::from_utf8_lossy(&written.stderr);
    if !stderr.is_empty() {
        return Err(Error::new(format!("Error executing command: {stderr}")));
    }
    // validate the ruleset and swap the table in
    let commands = [
        format!("nft -c -f {path}"),
        format!("nft add table bridge {}", config.filter_name),
        format!("nft flush table bridge {}", config.filter_name),
        format!("nft -f {path}"),
    ];
    for command in &commands {
        log.info(format!("Executing command: {command}"));
        let output = timeout(READ_TIMEOUT, session.raw_command(command).output()).await??;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            return Err(Error::new(format!("Error executing command: {stderr}")));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        log.info(format!("Output: {stdout}"));
    }
    session.close().await?;
    log.info("SSH connection closed");
    Ok(())
}
