//! The aclforge deploy worker
//!
//! Claims queued deploy jobs and drives the git, netmiko and proxmox-nft
//! delivery adaptors, capturing each jobs log onto its deployment row.

use clap::Parser;
use tracing::{span, Level};

mod args;
pub mod libs;

use libs::Worker;

#[tokio::main]
async fn main() {
    // parse our args
    let args = args::Args::parse();
    // load config
    let conf = aclforge::conf::Conf::new(&args.config).expect("Failed to load config");
    // setup our tracers/subscribers
    aclforge::utils::trace::setup("aclforge-worker", &conf.aclforge.tracing);
    // get the name for this worker
    let name = match args.node() {
        Ok(name) => name,
        Err(err) => {
            span!(Level::ERROR, "Worker Build Failure", err = err.msg());
            panic!("Worker Build Error: {:#?}", err);
        }
    };
    // build and start this nodes worker
    let worker = match Worker::new(conf, name).await {
        Ok(worker) => worker,
        Err(err) => {
            span!(Level::ERROR, "Worker Build Failure", err = err.msg());
            panic!("Worker Build Error: {:#?}", err);
        }
    };
    if let Err(err) = worker.start().await {
        span!(Level::ERROR, "Worker Failure", err = err.msg());
        panic!("Error: {:#?}", err);
    }
}
