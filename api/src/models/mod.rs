//! The data structures used by the aclforge API

pub mod backends;
mod deployers;
mod deployments;
mod dynamic_policies;
mod networks;
mod pages;
mod policies;
mod policy_tests;
mod revisions;
mod services;
mod targets;
mod users;

pub use deployers::{DeployMode, Deployer, DeployerConfig, DeployerRequest};
pub use deployments::{DeployJob, DeployReceipt, Deployment, DeploymentStatus};
pub use dynamic_policies::{DefaultAction, DynamicPolicy, DynamicPolicyRequest};
pub use networks::{Network, NetworkAddress, NetworkEntry, NetworkRequest, NetworkUsage};
pub use pages::{paginate, ListParams, Listable, Page};
pub use policies::{
    FilterTerm, NestedTerm, Policy, PolicyRequest, PolicyTerm, PolicyTermRequest, PolicyUsage,
    TermAction, TermBody, TermOption,
};
pub use policy_tests::{
    PolicyTest, PolicyTestCase, PolicyTestCaseRequest, PolicyTestRequest, TestCaseResult,
    TestRunReport, Wildcard,
};
pub use revisions::{revision_hash, Revision, RevisionConfig, RevisionRequest, RevisionSource};
pub use services::{
    PortRange, Protocol, Service, ServiceEntry, ServiceEntryKind, ServiceRequest, ServiceUsage,
};
pub use targets::{GeneratorKind, InetMode, Target, TargetRequest, TargetSubstitution};
pub use users::{AccessToken, TokenClaims, TokenForm, User, ALL_SCOPES};

/// Helps serde default a value to true
pub(crate) fn default_true() -> bool {
    true
}

/// Allow entities to be filtered and paged by the shared list params
macro_rules! listable {
    ($entity:ty) => {
        impl Listable for $entity {
            fn key_id(&self) -> i64 {
                self.id
            }
            fn key_name(&self) -> &str {
                &self.name
            }
            fn key_created(&self) -> chrono::DateTime<chrono::Utc> {
                self.created
            }
        }
    };
}

listable!(Network);
listable!(Service);
listable!(Policy);
listable!(DynamicPolicy);
listable!(Target);
listable!(PolicyTest);
listable!(Deployer);

impl Listable for Deployment {
    fn key_id(&self) -> i64 {
        self.id
    }
    // deployments have no name so filter against their status
    fn key_name(&self) -> &str {
        match self.status {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
        }
    }
    fn key_created(&self) -> chrono::DateTime<chrono::Utc> {
        self.created
    }
}

impl Listable for Revision {
    fn key_id(&self) -> i64 {
        self.id
    }
    // revisions have no name so filter against their comment
    fn key_name(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }
    fn key_created(&self) -> chrono::DateTime<chrono::Utc> {
        self.created
    }
}
