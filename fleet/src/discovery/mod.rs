//! Target discovery
//!
//! Splits the group list, drains the resource listing and keeps the
//! resources whose hosting plan lives in the requested group.

pub mod directory;
pub mod filter;
pub mod groups;
pub mod source;
