//! Builds the keys used to store aclforge data in redis

use crate::utils::Shared;

/// Builds the keys for one entity kind
macro_rules! entity_keys {
    ($keys:ident, $kind:expr) => {
        /// The keys to use to access this entity kinds data/sets
        #[derive(Debug)]
        pub struct $keys;

        impl $keys {
            /// builds the key to the set of all ids for this kind
            ///
            /// # Arguments
            ///
            /// * `shared` - Shared aclforge objects
            pub fn set(shared: &Shared) -> String {
                format!("{ns}:{kind}:ids", ns = shared.config.aclforge.namespace, kind = $kind)
            }

            /// builds the key to the name to id map for this kind
            ///
            /// # Arguments
            ///
            /// * `shared` - Shared aclforge objects
            pub fn names(shared: &Shared) -> String {
                format!(
                    "{ns}:{kind}:names",
                    ns = shared.config.aclforge.namespace,
                    kind = $kind
                )
            }

            /// builds the key to one instances data hash
            ///
            /// # Arguments
            ///
            /// * `id` - The id of the instance to build a key for
            /// * `shared` - Shared aclforge objects
            pub fn data(id: i64, shared: &Shared) -> String {
                format!(
                    "{ns}:{kind}:data:{id}",
                    ns = shared.config.aclforge.namespace,
                    kind = $kind
                )
            }
        }
    };
}

entity_keys!(NetworkKeys, "networks");
entity_keys!(ServiceKeys, "services");
entity_keys!(PolicyKeys, "policies");
entity_keys!(DynamicPolicyKeys, "dynamic_policies");
entity_keys!(TargetKeys, "targets");
entity_keys!(PolicyTestKeys, "tests");
entity_keys!(DeployerKeys, "deployers");
entity_keys!(DeploymentKeys, "deployments");
entity_keys!(RevisionKeys, "revisions");

/// The keys to use to allocate entity ids
#[derive(Debug)]
pub struct IdKeys;

impl IdKeys {
    /// builds the key to one entity kinds id counter
    ///
    /// # Arguments
    ///
    /// * `kind` - The entity kind to build a counter key for
    /// * `shared` - Shared aclforge objects
    pub fn counter(kind: &str, shared: &Shared) -> String {
        format!(
            "{ns}:ids:{kind}",
            ns = shared.config.aclforge.namespace
        )
    }
}

/// The keys to use to access the deploy job queue
#[derive(Debug)]
pub struct QueueKeys;

impl QueueKeys {
    /// builds the key to the deploy job queue
    ///
    /// # Arguments
    ///
    /// * `shared` - Shared aclforge objects
    pub fn deploys(shared: &Shared) -> String {
        format!("{ns}:deploys:queue", ns = shared.config.aclforge.namespace)
    }
}
