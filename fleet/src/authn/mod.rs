//! ARM authentication

pub mod token;
pub mod token_mngr;
