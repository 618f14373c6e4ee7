//! Shared objects and methods across all requests
use axum::extract::FromRef;
use bb8_redis::{bb8::Pool, RedisConnectionManager};
use std::sync::Arc;

use crate::models::backends::setup;
use crate::{conf::Conf, error, info};

/// Tries to execute a future 10 times with a custom timeout
///
/// # Arguments
///
/// * `future` - The future to try to complete
/// * `timeout` - How long to wait for each attempt to complete
macro_rules! retry {
    ($future:expr, $timeout:expr, $name:expr, $config:expr) => {{
        // setup a counter variable at 0 to track how many attempts have been made
        let mut i = 0;
        // loop and try to complete this future
        loop {
            match tokio::time::timeout(std::time::Duration::from_secs($timeout), $future).await {
                // the future completed so return the result
                Ok(res) => break res,
                // the future failed so try again if we have failed less then 10 times or panic
                Err(err) => {
                    // log this error
                    error!(
                        $config.aclforge.tracing.level,
                        format!(
                            "Future {} failed to complete in {} seconds. Restarting!",
                            $name, $timeout
                        )
                    );
                    if i == 9 {
                        // we failed 10 times so panic
                        panic!("{:#?}", err)
                    } else {
                        // increment i and try again
                        i += 1;
                        continue;
                    }
                }
            }
        }
    }};
}

/// Shared objects between all requests
pub struct Shared {
    /// The aclforge config
    pub config: Conf,
    /// A connection pool for redis
    pub redis: Pool<RedisConnectionManager>,
}

impl Shared {
    /// Sets up the shared object
    ///
    /// # Arguments
    ///
    /// * `config` - The aclforge config to use
    pub async fn new(config: Conf) -> Self {
        // log the namespace we will be using
        info!(
            config.aclforge.tracing.level,
            format!("Using namespace {}", config.aclforge.namespace)
        );
        // setup redis connection pool
        let redis = retry!(setup::redis(&config), 2, "Redis setup", config);
        Shared { config, redis }
    }
}

/// All of the global states in Axum
#[derive(Clone)]
pub struct AppState {
    /// The shared objects in aclforge
    pub shared: Arc<Shared>,
}

impl AppState {
    pub fn new(shared: Shared) -> Self {
        AppState {
            shared: Arc::new(shared),
        }
    }
}

impl FromRef<AppState> for Arc<Shared> {
    fn from_ref(state: &AppState) -> Self {
        state.shared.clone()
    }
}
