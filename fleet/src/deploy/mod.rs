//! Deployment dispatch

pub mod engine;
pub mod fsm;
pub mod transport;
