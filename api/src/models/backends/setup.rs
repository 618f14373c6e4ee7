//! Sets up connections to the aclforge backends

use bb8_redis::{bb8::Pool, RedisConnectionManager};

use crate::conf::Conf;
use crate::setup;

/// Build a redis connection pool
///
/// # Panics
///
/// Panics when the redis settings are invalid or the pool cannot be built.
///
/// # Arguments
///
/// * `config` - The aclforge config to use
pub async fn redis(config: &Conf) -> Pool<RedisConnectionManager> {
    // get redis config
    let redis = &config.redis;
    // build url to server using authentication if its configured
    let url = match (&redis.username, &redis.password) {
        // redis with username/password auth setup
        (Some(user), Some(password)) => format!(
            "redis://{}:{}@{}:{}/",
            user, password, redis.host, redis.port
        ),
        (None, Some(password)) => format!(
            "redis://default:{}@{}:{}/",
            password, redis.host, redis.port
        ),
        (None, None) => format!("redis://{}:{}/", redis.host, redis.port),
        _ => panic!("Redis Setup Error - Password must be set if username is set"),
    };
    setup!(
        config.aclforge.tracing.level,
        format!(
            "Connecting to redis at {}:{}",
            config.redis.host, config.redis.port
        )
    );
    // build manager
    let manager = match RedisConnectionManager::new(url) {
        Ok(manager) => manager,
        Err(e) => panic!("{}", e),
    };
    // build redis connection pool
    let pool = Pool::builder()
        .max_size(redis.pool_size.unwrap_or(50))
        .build(manager)
        .await
        .expect("Failed to build redis connection pool");
    setup!(config.aclforge.tracing.level, "Connected to redis");
    pool
}
