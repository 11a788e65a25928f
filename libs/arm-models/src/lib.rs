//! Azure Resource Manager models

pub mod models;
