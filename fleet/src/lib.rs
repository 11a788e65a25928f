//! kudufleet library
//!
//! Redeploys every Azure Function App of one or more resource groups from a
//! single git repository through the Kudu `/deploy` endpoint.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod discovery;
pub mod endpoint;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod report;
pub mod utils;
