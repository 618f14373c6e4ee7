//! The libraries backing the aclforge deploy worker

mod errors;
pub mod git;
pub mod logs;
pub mod netmiko;
pub mod proxmox_nft;
mod worker;

pub use errors::Error;
pub use worker::Worker;
