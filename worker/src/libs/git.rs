//! Pushes revision configs into git repositories

use aclforge::models::{Deployer, DeployerConfig, RevisionConfig};
use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, PushOptions, RemoteCallbacks, Signature, StatusOptions};
use rand::Rng;
use std::path::{Path, PathBuf};

use super::logs::JobLog;
use super::Error;

/// A scratch ssh key removed on every exit path
pub struct ScratchKey {
    /// The path the key was written to
    pub path: PathBuf,
}

impl Drop for ScratchKey {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Write an ssh key to a scratch file with restrictive permissions
///
/// # Arguments
///
/// * `key` - The ssh key text to write
pub fn write_scratch_key(key: &str) -> Result<ScratchKey, Error> {
    let path = std::env::temp_dir().join(format!(
        "aclforge-key-{:08x}",
        rand::rng().random::<u32>()
    ));
    // keys must end with a newline or ssh rejects them
    std::fs::write(&path, format!("{key}\n"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(ScratchKey { path })
}

/// A scratch clone dir removed on every exit path
struct ScratchDir {
    /// The path the repository was cloned into
    path: PathBuf,
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Build the credential callbacks for clone and push
///
/// # Arguments
///
/// * `key_path` - The scratch path holding the ssh key
fn callbacks(key_path: &Path) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, _allowed| {
        Cred::ssh_key(username_from_url.unwrap_or("git"), None, key_path, None)
    });
    callbacks
}

/// Commit a revision config into a git repository and push it
///
/// The repository is shallow cloned at the configured branch, the config is
/// written under the configured folder and the commit is skipped entirely
/// when the work tree comes out unchanged.
///
/// # Arguments
///
/// * `deployer` - The deployer this job runs for
/// * `revision_id` - The revision being deployed
/// * `config` - The revision config to push
/// * `log` - The captured log for this job
pub async fn deploy(
    deployer: &Deployer,
    revision_id: i64,
    config: &RevisionConfig,
    log: &mut JobLog,
) -> Result<(), Error> {
    let DeployerConfig::Git {
        repo_url,
        branch,
        folder_path,
        ssh_key_envvar,
    } = &deployer.config
    else {
        return Err(Error::new("deployer is missing its git config"));
    };
    // resolve the ssh key from the configured env var
    let envvar = ssh_key_envvar
        .as_deref()
        .ok_or_else(|| Error::new("No ssh key env var configured for this deployer"))?;
    let key = std::env::var(envvar)?;
    // the scratch key and clone dir are removed on every exit path
    let key = write_scratch_key(&key)?;
    let clone = ScratchDir {
        path: std::env::temp_dir().join(format!(
            "aclforge-clone-{:08x}",
            rand::rng().random::<u32>()
        )),
    };
    log.info(format!(
        "Cloning repository {repo_url} into {}",
        clone.path.display()
    ));
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks(&key.path));
    fetch.depth(2);
    let repo = RepoBuilder::new()
        .branch(branch)
        .fetch_options(fetch)
        .clone(repo_url, &clone.path)?;
    // write the config under the configured folder
    let relative = match folder_path {
        Some(folder) => {
            std::fs::create_dir_all(clone.path.join(folder))?;
            PathBuf::from(folder).join(&config.filename)
        }
        None => PathBuf::from(&config.filename),
    };
    let acl_path = clone.path.join(&relative);
    log.info(format!("Saving ACL to path: {}", acl_path.display()));
    std::fs::write(&acl_path, &config.config)?;
    // skip the commit when nothing actually changed
    let mut status_opts = StatusOptions::new();
    status_opts.include_untracked(true);
    let statuses = repo.statuses(Some(&mut status_opts))?;
    if statuses.is_empty() {
        log.info("No changes made, skipping");
        return Ok(());
    }
    log.info(format!("Committing changes to {}", relative.display()));
    let mut index = repo.index()?;
    index.add_path(&relative)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let parent = repo.head()?.peel_to_commit()?;
    let signature = Signature::now("aclforge", "aclforge@localhost")?;
    let message = format!("{} updated, revision_id={}", config.filename, revision_id);
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &message,
        &tree,
        &[&parent],
    )?;
    log.info("Pushing changes to the repository");
    let mut push_opts = PushOptions::new();
    push_opts.remote_callbacks(callbacks(&key.path));
    let mut remote = repo.find_remote("origin")?;
    remote.push(
        &[format!("refs/heads/{branch}:refs/heads/{branch}")],
        Some(&mut push_opts),
    )?;
    Ok(())
}
