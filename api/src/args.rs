//! The arguments to pass to the aclforge API

use clap::Parser;

/// Command line args
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct Args {
    /// The path to load the aclforge config file from
    #[clap(short, long, default_value = "aclforge.yml")]
    pub config: String,
}
