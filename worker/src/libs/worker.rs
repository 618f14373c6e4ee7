//! The deploy worker loop
//!
//! Workers claim one job at a time off the shared redis queue so their
//! captured logs never interleave, run the matching adaptor and record the
//! outcome on the deployment row.

use aclforge::models::backends::db;
use aclforge::models::{DeployJob, DeployMode, DeploymentStatus};
use aclforge::utils::Shared;
use aclforge::Conf;
use tracing::{event, instrument, Level};

use super::logs::JobLog;
use super::{git, netmiko, proxmox_nft, Error};

/// How long each queue claim blocks waiting for a job in seconds
const CLAIM_TIMEOUT: u64 = 5;

/// A deploy worker bound to the shared job queue
pub struct Worker {
    /// Shared aclforge objects
    shared: Shared,
    /// The name of this worker
    name: String,
}

impl Worker {
    /// Build a new deploy worker
    ///
    /// # Arguments
    ///
    /// * `conf` - The aclforge config to use
    /// * `name` - The name of this worker
    pub async fn new(conf: Conf, name: String) -> Result<Self, Error> {
        // connect to redis like the api does
        let shared = Shared::new(conf).await;
        Ok(Worker { shared, name })
    }

    /// Claim and run jobs until the process is stopped
    pub async fn start(&self) -> Result<(), Error> {
        event!(Level::INFO, worker = self.name, msg = "Worker started");
        loop {
            // claim the next job off the queue
            match db::queue::claim(CLAIM_TIMEOUT, &self.shared).await {
                Ok(Some(job)) => self.handle(job).await,
                // the queue was empty so just poll again
                Ok(None) => continue,
                Err(error) => {
                    event!(Level::ERROR, msg = error.to_string());
                    // give the backend a moment before retrying
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Run one claimed deploy job and record its outcome
    ///
    /// # Arguments
    ///
    /// * `job` - The job to run
    #[instrument(name = "Worker::handle", skip_all, fields(deployment = job.deployment_id))]
    async fn handle(&self, job: DeployJob) {
        // load the deployment this job updates
        if let Err(error) = db::deployments::get(job.deployment_id, &self.shared).await {
            event!(Level::ERROR, msg = error.to_string());
            return;
        }
        // mark it running before any remote work starts
        if let Err(error) = db::deployments::set_status(
            job.deployment_id,
            DeploymentStatus::Running,
            None,
            &self.shared,
        )
        .await
        {
            event!(Level::ERROR, msg = error.to_string());
            return;
        }
        // each job gets its own capture sink
        let mut log = JobLog::new();
        let status = match self.run_adaptor(&job, &mut log).await {
            Ok(()) => DeploymentStatus::Completed,
            Err(error) => {
                log.error(error.to_string());
                DeploymentStatus::Failed
            }
        };
        // record the outcome and the captured log
        if let Err(error) = db::deployments::set_status(
            job.deployment_id,
            status,
            Some(&log.render()),
            &self.shared,
        )
        .await
        {
            event!(Level::ERROR, msg = error.to_string());
        }
    }

    /// Dispatch a job to its delivery adaptor
    ///
    /// # Arguments
    ///
    /// * `job` - The job to dispatch
    /// * `log` - The captured log for this job
    async fn run_adaptor(&self, job: &DeployJob, log: &mut JobLog) -> Result<(), Error> {
        // load the deployer and the config this job pushes
        let deployer = db::deployers::get(job.deployer_id, &self.shared).await?;
        let revision = db::revisions::get(job.revision_id, &self.shared).await?;
        let Some(config) = revision
            .configs
            .iter()
            .find(|config| config.target_id == deployer.target_id)
        else {
            log.error("No revision config found for the given revision and target.");
            return Err(Error::new(
                "No revision config found for the given revision and target.",
            ));
        };
        match job.mode {
            DeployMode::Git => git::deploy(&deployer, job.revision_id, config, log).await,
            DeployMode::Netmiko => {
                let target = db::targets::get(deployer.target_id, &self.shared).await?;
                // the configured url lets cisco devices pull configs over http
                let api_url = self
                    .shared
                    .config
                    .aclforge
                    .api_url
                    .clone()
                    .or_else(|| std::env::var("API_URL").ok());
                netmiko::deploy(
                    &deployer,
                    job.revision_id,
                    config,
                    api_url.as_deref(),
                    target.generator,
                    log,
                )
                .await
            }
            DeployMode::ProxmoxNft => proxmox_nft::deploy(&deployer, config, log).await,
        }
    }
}
