//! Azure Resource Manager access

pub mod client;
pub mod sites;
