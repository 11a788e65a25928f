//! Application wiring

pub mod options;
pub mod run;
pub mod settings;
