//! Sets up tracing for aclforge using stdout/stderr

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::conf::Tracing;

/// Log a message at the info level
#[macro_export]
macro_rules! info {
    ($level:expr, $($msg:tt)+) => {
        if $level == $crate::conf::LogLevel::Info
        || $level == $crate::conf::LogLevel::Debug
        || $level == $crate::conf::LogLevel::Trace  {
            println!("{}", serde_json::json!({"timestamp": chrono::Utc::now(), "level": "INFO", "msg": $($msg)+}));
        }
    }
}

/// Log a message at the setup level
#[macro_export]
macro_rules! setup {
    ($level:expr, $($msg:tt)+) => {
        if $level == $crate::conf::LogLevel::Setup
        || $level == $crate::conf::LogLevel::Info
        || $level == $crate::conf::LogLevel::Debug
        || $level == $crate::conf::LogLevel::Trace  {
            println!("{}", serde_json::json!({"timestamp": chrono::Utc::now(), "level": "SETP", "msg": $($msg)+}));
        }
    }
}

/// Log a message at the error level
#[macro_export]
macro_rules! error {
    ($level:expr, $($msg:tt)+) => {
        if $level != $crate::conf::LogLevel::Off {
            println!("{}", serde_json::json!({"timestamp": chrono::Utc::now(), "level": "ERRO", "msg": $($msg)+}));
        }
    }
}

/// Setup our local tracers/subscribers
///
/// # Arguments
///
/// * `name` - The name of the service to trace
/// * `conf` - The tracing settings to use
pub fn setup(name: &str, conf: &Tracing) {
    // build the filter for our subscriber from our configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", name, conf.level.to_filter())))
        .add_directive(
            conf.level
                .to_filter()
                .parse()
                .expect("Failed to parse log level directive"),
        );
    // build and install our local subscriber
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter);
    // ignore failures when a subscriber was already installed (tests)
    let _ = registry.try_init();
}
