//! The arguments to pass to the aclforge deploy worker

use clap::Parser;

use crate::libs::Error;

/// Command line args
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct Args {
    /// The path to load the aclforge config file from
    #[clap(short, long, default_value = "aclforge.yml")]
    pub config: String,
    /// The name of this worker
    #[clap(short, long)]
    pub name: Option<String>,
}

impl Args {
    /// Get this workers name
    pub fn node(&self) -> Result<String, Error> {
        match &self.name {
            Some(name) => Ok(name.clone()),
            None => match gethostname::gethostname().into_string() {
                Ok(hostname) => Ok(hostname),
                Err(err) => Err(Error::new(format!(
                    "Failed to get hostname with {:#?}",
                    err
                ))),
            },
        }
    }
}
