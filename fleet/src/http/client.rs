//! ARM HTTP client

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use arm_models::models::ErrorResponse;

use crate::authn::token_mngr::TokenProvider;
use crate::errors::FleetError;
use crate::utils::{elide, request_id};

/// ARM client options
#[derive(Debug, Clone)]
pub struct ArmOptions {
    /// Resource manager endpoint
    pub management_url: String,

    /// `api-version` query parameter for `Microsoft.Web`
    pub api_version: String,

    /// Timeout of a single ARM request
    pub request_timeout: Duration,

    /// Wait between polls of an accepted (202) operation, unless the
    /// response names its own `Retry-After`
    pub poll_interval: Duration,

    /// Polls before an accepted operation is given up
    pub max_polls: u32,
}

impl Default for ArmOptions {
    fn default() -> Self {
        Self {
            management_url: "https://management.azure.com".to_string(),
            api_version: "2022-03-01".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            max_polls: 15,
        }
    }
}

/// HTTP client for Azure Resource Manager
pub struct ArmClient {
    client: Client,
    base_url: Url,
    api_version: String,
    subscription_id: String,
    tokens: Option<Arc<dyn TokenProvider>>,
    pub(crate) poll_interval: Duration,
    pub(crate) max_polls: u32,
}

impl ArmClient {
    /// Create a new ARM client; without a token provider requests are sent
    /// unauthenticated
    pub fn new(
        options: &ArmOptions,
        subscription_id: &str,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self, FleetError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(concat!("kudufleet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(options.management_url.trim_end_matches('/'))?;

        Ok(Self {
            client,
            base_url,
            api_version: options.api_version.clone(),
            subscription_id: subscription_id.to_string(),
            tokens,
            poll_interval: options.poll_interval,
            max_polls: options.max_polls,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Absolute URL of an ARM resource path with the `api-version` set
    pub fn resource_url(&self, path: &str) -> Result<Url, FleetError> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Parse a server-provided link, refusing hosts other than the ARM
    /// endpoint so the bearer token never leaves it
    pub fn follow_link(&self, link: &str) -> Result<Url, FleetError> {
        let url = self.base_url.join(link)?;
        if url.origin() != self.base_url.origin() {
            return Err(FleetError::DirectoryError(format!(
                "refusing to follow link to foreign host: {}",
                url.host_str().unwrap_or_default()
            )));
        }
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, FleetError> {
        let mut request = self
            .client
            .request(method, url)
            .header("x-ms-client-request-id", request_id());

        if let Some(tokens) = &self.tokens {
            let token = tokens.get_token().await?;
            request = request.header(header::AUTHORIZATION, token.bearer());
        }

        Ok(request)
    }

    /// Send a request and fail on any non-2xx status
    pub async fn send(&self, method: Method, url: Url) -> Result<Response, FleetError> {
        debug!("{} {}", method, url);
        let response = self.request(method.clone(), url).await?.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let raw = response.text().await.unwrap_or_default();
            error!("ARM {} failed: {} - {}", method, status, elide(&raw, 512));
            let body = error_message(raw);
            return Err(FleetError::ArmError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FleetError> {
        let response = self.send(Method::GET, url).await?;
        let body = response.json().await?;
        Ok(body)
    }
}

/// `<code>: <message>` from an ARM error envelope, the raw body otherwise
fn error_message(raw: String) -> String {
    match serde_json::from_str::<ErrorResponse>(&raw) {
        Ok(envelope) => format!("{}: {}", envelope.error.code, envelope.error.message),
        Err(_) => raw,
    }
}
