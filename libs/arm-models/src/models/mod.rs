//! ARM models

use serde::{Deserialize, Serialize};

/// One page of a `Microsoft.Web/sites` listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteListPage {
    #[serde(default)]
    pub value: Vec<serde_json::Value>,

    /// Absolute URL of the next page, absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// Publishing user returned by `config/publishingcredentials/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingUser {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub properties: PublishingUserProperties,
}

/// Publishing user properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingUserProperties {
    #[serde(default)]
    pub publishing_user_name: Option<String>,
    #[serde(default)]
    pub publishing_password: Option<String>,
    /// Kudu SCM URI with basic-auth userinfo
    #[serde(default)]
    pub scm_uri: Option<String>,
}

/// Source control configuration of a site (`sourcecontrols/web`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSourceControl {
    pub name: Option<String>,
    #[serde(default)]
    pub properties: SiteSourceControlProperties,
}

/// Source control properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSourceControlProperties {
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub is_manual_integration: Option<bool>,
}

/// OAuth2 token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// ARM error envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// ARM error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
