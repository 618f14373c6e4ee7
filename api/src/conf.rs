//! The shared config for aclforge

use std::path::Path;

/// Helps serde default a value to false
fn default_false() -> bool {
    false
}

/// Helps serde default a value to true
fn default_true() -> bool {
    true
}

/// Helps serde default the api interface to 0.0.0.0
fn default_api_interface() -> String {
    "0.0.0.0".to_owned()
}

/// Helps serde default the api port to 8000
fn default_api_port() -> u16 {
    8000
}

/// Helps serde default the backend namespace
fn default_namespace() -> String {
    "aclforge".to_owned()
}

/// Helps serde default what to prepend to usernames when binding in ldap
fn default_user_prepend() -> String {
    "cn=".to_owned()
}

/// Helps serde default the ldap attribute holding usernames
fn default_username_attr() -> String {
    "cn".to_owned()
}

/// Helps serde default the ldap attribute holding display names
fn default_name_attr() -> String {
    "displayName".to_owned()
}

/// Helps serde default the ldap attribute holding email addresses
fn default_email_attr() -> String {
    "mail".to_owned()
}

/// The settings to use when binding users against ldap
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ldap {
    /// The hostname ldap can be reached at including ldap:// or ldaps://
    pub host: String,
    /// What to prepend to the username to bind too
    #[serde(default = "default_user_prepend")]
    pub user_prepend: String,
    /// What to append to the username to bind too (e.g. ",ou=people,dc=example,dc=org")
    pub user_append: String,
    /// The base to search for user attributes under
    pub search_base: String,
    /// The attribute to read usernames from
    #[serde(default = "default_username_attr")]
    pub username_attr: String,
    /// The attribute to read display names from
    #[serde(default = "default_name_attr")]
    pub name_attr: String,
    /// The attribute to read email addresses from
    #[serde(default = "default_email_attr")]
    pub email_attr: String,
    /// Verify that the TLS cert is valid or not
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

/// Helps serde default the token expiration to 60 minutes
fn default_token_expire() -> i64 {
    60
}

/// The settings to use when minting and validating bearer tokens
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Jwt {
    /// The secret key used to sign tokens with HS256
    pub secret_key: String,
    /// How long minted tokens live for in minutes
    #[serde(default = "default_token_expire")]
    pub token_expire: i64,
}

/// Authentication settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Auth {
    /// The settings to use for ldap
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldap: Option<Ldap>,
    /// The settings to use for bearer tokens
    pub jwt: Jwt,
}

/// The log levels to use
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Do not log anything
    Off,
    /// Log errors only
    Error,
    /// Log setup steps and errors
    Setup,
    /// Log requests and errors
    Info,
    /// Log debug info
    Debug,
    /// Log everything
    Trace,
}

impl Default for LogLevel {
    /// Default the log level to info
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// Get the env filter directive for this log level
    #[must_use]
    pub fn to_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Setup => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// The tracing settings to use
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Tracing {
    /// The log level to use
    #[serde(default)]
    pub level: LogLevel,
}

/// Cross origin request settings
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Cors {
    /// Whether to allow CORS requests from any domain
    #[serde(default = "default_false")]
    pub insecure: bool,
    /// The domains to allow cross origin requests from
    #[serde(default)]
    pub domains: Vec<String>,
}

/// The settings for the aclforge API and workers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AclForge {
    /// The interface to bind onto
    #[serde(default = "default_api_interface")]
    pub interface: String,
    /// The port to bind to
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// The namespace to use in the backend
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// The external url this API is reachable at (used by the netmiko
    /// http copy path)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// The tracing settings to use
    #[serde(default)]
    pub tracing: Tracing,
    /// The settings to use to configure CORS
    #[serde(default)]
    pub cors: Cors,
    /// The authentication settings to use
    pub auth: Auth,
}

/// Redis settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Redis {
    /// The host redis is reachable at
    pub host: String,
    /// The port redis is bound to
    pub port: u16,
    /// The number of connections to have in the connection pool
    pub pool_size: Option<u32>,
    /// A username to use if redis has authentication enabled
    pub username: Option<String>,
    /// A password to use if redis has authentication enabled
    pub password: Option<String>,
}

/// configs for aclforge
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Conf {
    /// aclforge configs
    pub aclforge: AclForge,
    /// Redis settings
    pub redis: Redis,
}

impl Conf {
    /// Creates a new [Conf] object
    ///
    /// # Arguments
    ///
    /// * `path` - The path to use when reading the config file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let conf: Conf = config::Config::builder()
            // load from a file first
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Yaml))
            // then overlay any environment args ontop
            .add_source(
                config::Environment::with_prefix("aclforge")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Ok(conf)
    }

    /// Change the namespace for this config
    ///
    /// # Arguments
    ///
    /// * `namespace` - The namespace for this config
    #[must_use]
    pub fn namespace<T: Into<String>>(mut self, namespace: T) -> Self {
        // update this configs namespace
        self.aclforge.namespace = namespace.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// build a config from yaml for tests
    fn conf_from_yaml(raw: &str) -> Conf {
        let parsed: Conf = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        parsed
    }

    #[test]
    fn defaults_are_applied() {
        let conf = conf_from_yaml(
            r#"
            aclforge:
              auth:
                jwt:
                  secret_key: supersecret
            redis:
              host: 127.0.0.1
              port: 6379
            "#,
        );
        assert_eq!(conf.aclforge.interface, "0.0.0.0");
        assert_eq!(conf.aclforge.port, 8000);
        assert_eq!(conf.aclforge.namespace, "aclforge");
        assert_eq!(conf.aclforge.auth.jwt.token_expire, 60);
        assert!(conf.aclforge.auth.ldap.is_none());
    }

    #[test]
    fn ldap_settings_parse() {
        let conf = conf_from_yaml(
            r#"
            aclforge:
              namespace: acltest
              auth:
                jwt:
                  secret_key: supersecret
                  token_expire: 5
                ldap:
                  host: ldaps://ldap.example.org
                  user_append: ",ou=people,dc=example,dc=org"
                  search_base: "ou=people,dc=example,dc=org"
            redis:
              host: 127.0.0.1
              port: 6379
              pool_size: 10
            "#,
        );
        let ldap = conf.aclforge.auth.ldap.unwrap();
        assert_eq!(ldap.user_prepend, "cn=");
        assert_eq!(ldap.username_attr, "cn");
        assert!(ldap.tls_verify);
        assert_eq!(conf.aclforge.auth.jwt.token_expire, 5);
        assert_eq!(conf.redis.pool_size, Some(10));
    }
}
