//! Deployment transport
//!
//! Sends the deployment payload to `<endpoint>/deploy`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::errors::FleetError;
use crate::models::deployment::DeploymentRequest;

/// Raw response of a deploy call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResponse {
    pub status: u16,
    pub body: String,
}

/// Issues one deploy call; errors mean no HTTP response was obtained
#[async_trait]
pub trait DeployTransport: Send + Sync {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &DeploymentRequest,
    ) -> Result<DeployResponse, FleetError>;
}

/// Kudu `/deploy` over HTTPS
pub struct KuduTransport {
    client: Client,
}

impl KuduTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FleetError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kudufleet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeployTransport for KuduTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &DeploymentRequest,
    ) -> Result<DeployResponse, FleetError> {
        debug!("POST {}", endpoint.deploy_url());

        let mut builder = self
            .client
            .post(endpoint.deploy_url().clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(request.bytes().to_vec());

        if let Some((username, password)) = endpoint.basic_auth() {
            builder = builder.basic_auth(username, password);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(DeployResponse { status, body })
    }
}
