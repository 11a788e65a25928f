//! `Microsoft.Web/sites` operations
//!
//! The ARM client is the production resource directory, credential provider
//! and source-control inspector.

use arm_models::models::{PublishingUser, SiteListPage, SiteSourceControl};
use async_trait::async_trait;
use reqwest::{header, Method, Response, StatusCode};
use tracing::{debug, warn};

use crate::discovery::directory::{ResourceDescriptor, ResourceDirectory, ResourcePage};
use crate::discovery::source::SourceControlInspector;
use crate::endpoint::resolver::CredentialProvider;
use crate::errors::FleetError;
use crate::http::client::ArmClient;

impl ArmClient {
    fn site_path(&self, group: &str, name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}",
            self.subscription_id(),
            group,
            name
        )
    }

    /// Fetch the publishing credentials of a site, waiting out a 202
    pub async fn publishing_user(&self, group: &str, name: &str) -> Result<PublishingUser, FleetError> {
        let url = self.resource_url(&format!(
            "{}/config/publishingcredentials/list",
            self.site_path(group, name)
        ))?;
        let mut response = self.send(Method::POST, url).await?;

        let mut polls = 0;
        while response.status() == StatusCode::ACCEPTED {
            if polls == self.max_polls {
                return Err(FleetError::CredentialError(format!(
                    "publishing credentials for {} not ready after {} polls",
                    name, polls
                )));
            }
            polls += 1;

            let location = header_str(&response, header::LOCATION).ok_or_else(|| {
                FleetError::CredentialError("202 Accepted without a Location header".to_string())
            })?;
            let next = self.follow_link(&location)?;
            let wait = header_str(&response, header::RETRY_AFTER)
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs)
                .unwrap_or(self.poll_interval);

            debug!("Publishing credentials for {} pending, polling again in {:?}", name, wait);
            tokio::time::sleep(wait).await;
            response = self.send(Method::GET, next).await?;
        }

        Ok(response.json().await?)
    }

    /// Source control configured on a site
    pub async fn source_control(&self, group: &str, name: &str) -> Result<SiteSourceControl, FleetError> {
        let url = self.resource_url(&format!("{}/sourcecontrols/web", self.site_path(group, name)))?;
        self.get_json(url).await
    }
}

fn header_str(response: &Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl ResourceDirectory for ArmClient {
    async fn list_page(&self, cursor: Option<&str>) -> Result<ResourcePage, FleetError> {
        let url = match cursor {
            Some(link) => self.follow_link(link)?,
            None => self.resource_url(&format!(
                "/subscriptions/{}/providers/Microsoft.Web/sites",
                self.subscription_id()
            ))?,
        };

        let page: SiteListPage = self.get_json(url).await?;
        let mut resources = Vec::with_capacity(page.value.len());
        for metadata in page.value {
            let name = metadata
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string);
            match name {
                Some(name) => resources.push(ResourceDescriptor { name, metadata }),
                None => warn!("Skipping listed site without a name"),
            }
        }

        Ok(ResourcePage {
            resources,
            next: page.next_link.filter(|link| !link.is_empty()),
        })
    }
}

#[async_trait]
impl CredentialProvider for ArmClient {
    async fn get_endpoint(&self, group: &str, target: &str) -> Result<String, FleetError> {
        let user = self.publishing_user(group, target).await?;
        user.properties
            .scm_uri
            .ok_or_else(|| FleetError::CredentialError(format!("no scmUri for {}", target)))
    }
}

#[async_trait]
impl SourceControlInspector for ArmClient {
    async fn describe_source(&self, group: &str, target: &str) -> Result<String, FleetError> {
        let source = self.source_control(group, target).await?;
        let props = source.properties;
        let described = match props.repo_url {
            Some(repo) => format!(
                "{} (branch: {}, manual integration: {})",
                repo,
                props.branch.as_deref().unwrap_or("-"),
                props.is_manual_integration.unwrap_or(false)
            ),
            None => "no source control configured".to_string(),
        };
        Ok(described)
    }
}
