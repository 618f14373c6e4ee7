mod args;

use clap::Parser;

/// Start the aclforge API
#[tokio::main]
async fn main() {
    // load command line args
    let args = args::Args::parse();
    // load config
    let conf = aclforge::conf::Conf::new(&args.config).expect("Failed to load config");
    // setup our tracers/subscribers
    aclforge::utils::trace::setup("aclforge-api", &conf.aclforge.tracing);
    // launch our api
    Box::pin(aclforge::axum(conf)).await;
}
