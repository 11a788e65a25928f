//! Kudu models

use serde::{Deserialize, Serialize};

/// Package format understood by the Kudu `/deploy` hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployFormat {
    #[default]
    Basic,
}

/// Body of `POST <scm>/deploy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub format: DeployFormat,
    pub url: String,
}

impl DeployRequest {
    /// Deploy from a git repository URL
    pub fn basic(url: impl Into<String>) -> Self {
        Self {
            format: DeployFormat::Basic,
            url: url.into(),
        }
    }
}
