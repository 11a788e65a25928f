//! Kudu deployment models

pub mod models;
