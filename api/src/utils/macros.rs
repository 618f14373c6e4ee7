//! Helper macros for the aclforge API

/// Serialize data to a string
#[doc(hidden)]
#[macro_export]
macro_rules! serialize {
    ($data:expr) => {
        match serde_json::to_string($data) {
            Ok(serial) => serial,
            Err(e) => return $crate::bad!(format!("Failed to serialize data with error {}", e)),
        }
    };
}

/// Deserialize data from a string
#[doc(hidden)]
#[macro_export]
macro_rules! deserialize {
    ($data:expr) => {
        match serde_json::from_str($data) {
            Ok(serial) => serial,
            Err(e) => return $crate::bad!(format!("Failed to deserialize data with error {}", e)),
        }
    };
    ($data:expr, $key:expr) => {
        match serde_json::from_str($data) {
            Ok(serial) => serial,
            Err(e) => {
                return $crate::bad!(format!("Failed to deserialize {} with error {}", $key, e))
            }
        }
    };
}

/// Extract a string from a map and deserialize it
#[doc(hidden)]
#[macro_export]
macro_rules! deserialize_ext {
    ($map:expr, $key:expr) => {
        match $map.get($key) {
            Some(data) => $crate::deserialize!(data, $key),
            None => return $crate::bad!(format!("Failed to extract {}", $key)),
        }
    };
    ($map:expr, $key:expr, $def:expr) => {
        match $map.get($key) {
            Some(data) => $crate::deserialize!(data, $key),
            None => $def,
        }
    };
}

/// Deserialize data from a string wrapped in an option
#[doc(hidden)]
#[macro_export]
macro_rules! deserialize_opt {
    ($map:expr, $key:expr) => {
        match $map.get($key) {
            Some(data) => Some($crate::deserialize!(data, $key)),
            None => None,
        }
    };
}

/// Extract a value from a map
#[doc(hidden)]
#[macro_export]
macro_rules! extract {
    ($map:expr, $key:expr) => {
        match $map.remove($key) {
            Some(value) => value,
            None => return $crate::bad!(format!("Failed to extract {}", $key)),
        }
    };
    ($map:expr, $key:expr, $default:expr) => {
        match $map.remove($key) {
            Some(value) => value,
            None => $default,
        }
    };
}

/// Return forbidden when a user is missing a required scope
#[doc(hidden)]
#[macro_export]
macro_rules! require_scopes {
    ($user:expr, $($scope:expr),+) => {
        $(
            if !$user.scopes.iter().any(|have| have == $scope) {
                // log this user failed a scope check
                tracing::event!(
                    tracing::Level::ERROR,
                    missing_scope = $scope,
                    user = &$user.username
                );
                return $crate::forbidden!("Not enough permissions".to_owned());
            }
        )+
    };
}

/// Create an ldap connection and client
#[doc(hidden)]
#[macro_export]
macro_rules! ldap {
    ($conf:expr) => {
        ldap3::LdapConnAsync::with_settings(
            ldap3::LdapConnSettings::new().set_no_tls_verify(!$conf.tls_verify),
            &$conf.host,
        )
    };
}

