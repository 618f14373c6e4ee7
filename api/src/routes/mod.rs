//! The routes for the aclforge API

pub mod basic;
pub mod deployers;
pub mod deployments;
pub mod docs;
pub mod dynamic_policies;
pub mod networks;
pub mod policies;
pub mod policy_tests;
pub mod revisions;
pub mod services;
pub mod targets;
pub mod users;
