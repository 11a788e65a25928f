//! Error types for kudufleet

use thiserror::Error;

/// How far a failure reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Stops the process before or between groups
    Process,
    /// Skips the rest of one group
    Group,
    /// Affects a single target only
    Target,
}

/// Main error type for kudufleet
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Directory error: {0}")]
    DirectoryError(String),

    #[error("Credential error: {0}")]
    CredentialError(String),

    #[error("ARM request failed: {status} - {body}")]
    ArmError { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Classify the error by the blast radius it is allowed to have
    pub fn scope(&self) -> ErrorScope {
        match self {
            FleetError::ConfigError(_) | FleetError::Internal(_) => ErrorScope::Process,
            FleetError::CredentialError(_) => ErrorScope::Target,
            _ => ErrorScope::Group,
        }
    }
}

/// Why a target could not be given a dispatchable endpoint
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("credential lookup failed: {0}")]
    Lookup(#[source] FleetError),

    #[error("no endpoint returned")]
    Missing,

    #[error("endpoint is not a valid URI: {0}")]
    Malformed(String),
}
