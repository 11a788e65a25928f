//! Token providers for ARM requests

use std::time::Duration;

use arm_models::models::TokenResponse;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::authn::token::AccessToken;
use crate::errors::FleetError;

/// Refresh tokens this many seconds before they expire
const REFRESH_MARGIN_SECS: i64 = 300;

/// Token provider trait for testability
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a token valid for at least a few more minutes
    async fn get_token(&self) -> Result<AccessToken, FleetError>;
}

/// Service principal credentials
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Client-credentials token manager with an in-memory cache
pub struct TokenManager {
    http: Client,
    token_url: String,
    scope: String,
    credentials: ClientCredentials,
    cached_token: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    /// Create a token manager for `resource` (e.g. `https://management.azure.com`)
    pub fn new(
        login_url: &str,
        resource: &str,
        credentials: ClientCredentials,
    ) -> Result<Self, FleetError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            login_url.trim_end_matches('/'),
            credentials.tenant_id
        );
        let scope = format!("{}/.default", resource.trim_end_matches('/'));

        Ok(Self {
            http,
            token_url,
            scope,
            credentials,
            cached_token: RwLock::new(None),
        })
    }

    async fn fetch_token(&self) -> Result<AccessToken, FleetError> {
        debug!("POST {} (client credentials)", self.token_url);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token request failed: {} - {}", status, body);
            return Err(FleetError::AuthError(format!(
                "Token request failed: {} - {}",
                status, body
            )));
        }

        let body: TokenResponse = response.json().await?;
        Ok(AccessToken::expiring_in(body.access_token, body.expires_in))
    }
}

#[async_trait]
impl TokenProvider for TokenManager {
    async fn get_token(&self) -> Result<AccessToken, FleetError> {
        // Try the cache first
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.expires_within(REFRESH_MARGIN_SECS) {
                    return Ok(token.duplicate());
                }
            }
        }

        let mut cached = self.cached_token.write().await;
        if let Some(token) = cached.as_ref() {
            if !token.expires_within(REFRESH_MARGIN_SECS) {
                return Ok(token.duplicate());
            }
        }

        info!("Requesting ARM access token for client {}", self.credentials.client_id);
        let token = self.fetch_token().await?;
        info!("Access token acquired, expires at: {}", token.expires_at());

        let out = token.duplicate();
        *cached = Some(token);
        Ok(out)
    }
}

/// Pre-acquired token, e.g. from `az account get-access-token`
#[derive(Debug)]
pub struct StaticToken {
    token: AccessToken,
}

impl StaticToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            token: AccessToken::non_expiring(raw),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn get_token(&self) -> Result<AccessToken, FleetError> {
        Ok(self.token.duplicate())
    }
}
