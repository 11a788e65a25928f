//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::app::settings::{
    Settings, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_GROUPS, ENV_REPO_URL, ENV_SUBSCRIPTION,
    ENV_TENANT_ID,
};
use crate::authn::token_mngr::ClientCredentials;
use crate::deploy::engine::DispatchOptions;
use crate::discovery::groups::resolve_groups;
use crate::errors::FleetError;
use crate::http::client::ArmOptions;
use crate::logs::LogOptions;

/// How ARM requests are authenticated
#[derive(Debug)]
pub enum IdentityOptions {
    /// Service principal, token fetched and cached by the tool
    ClientCredentials(ClientCredentials),

    /// Pre-acquired bearer token
    StaticToken(SecretString),

    /// No `Authorization` header at all
    Anonymous,
}

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Resource groups, in processing order
    pub groups: Vec<String>,

    /// Azure subscription id
    pub subscription_id: String,

    /// Repository every target is redeployed from
    pub repo_url: String,

    /// Dispatch engine options
    pub dispatch: DispatchOptions,

    /// ARM client options
    pub arm: ArmOptions,

    /// ARM identity
    pub identity: IdentityOptions,

    /// Identity platform endpoint
    pub login_url: String,

    /// Log the source control of each target before deploying
    pub check_source: bool,

    /// Colorize the report
    pub color: bool,

    /// Logging options
    pub log: LogOptions,
}

impl AppOptions {
    /// Validate loaded settings into runtime options.
    ///
    /// Every missing required setting is named in the error, not only the
    /// first one.
    pub fn from_settings(settings: Settings) -> Result<Self, FleetError> {
        let groups = required(settings.resource_groups);
        let subscription_id = required(settings.subscription_id);
        let repo_url = required(settings.repo_url);

        let mut missing = Vec::new();
        if groups.is_none() {
            missing.push(format!("{} (--groups)", ENV_GROUPS));
        }
        if subscription_id.is_none() {
            missing.push(format!("{} (--subscription)", ENV_SUBSCRIPTION));
        }
        if repo_url.is_none() {
            missing.push(format!("{} (--repo-url)", ENV_REPO_URL));
        }

        let (Some(groups), Some(subscription_id), Some(repo_url)) =
            (groups, subscription_id, repo_url)
        else {
            return Err(FleetError::ConfigError(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        };

        let groups = resolve_groups(&groups);
        if groups.is_empty() {
            return Err(FleetError::ConfigError(format!(
                "{} does not name any resource group",
                ENV_GROUPS
            )));
        }

        if settings.dispatch.max_attempts == 0 {
            return Err(FleetError::ConfigError(
                "max-attempts must be at least 1".to_string(),
            ));
        }

        let azure = settings.azure;
        let identity = identity(
            azure.tenant_id,
            azure.client_id,
            azure.client_secret,
            azure.access_token,
        )?;

        Ok(Self {
            groups,
            subscription_id,
            repo_url,
            dispatch: DispatchOptions {
                max_attempts: settings.dispatch.max_attempts,
                retry_delay: Duration::from_secs(settings.dispatch.retry_delay_secs),
                attempt_timeout: Duration::from_secs(settings.dispatch.attempt_timeout_secs),
                batch_deadline: Duration::from_secs(settings.dispatch.batch_deadline_secs),
                max_concurrency: settings.dispatch.max_concurrency,
            },
            arm: ArmOptions {
                management_url: azure.management_url,
                api_version: azure.api_version,
                ..Default::default()
            },
            identity,
            login_url: azure.login_url,
            check_source: settings.check_source,
            color: settings.color,
            log: LogOptions {
                log_level: settings.log_level,
                json_format: settings.json_logs,
                log_dir: settings.log_dir,
            },
        })
    }

    /// Effective configuration as key/value pairs, secrets left out
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let identity = match &self.identity {
            IdentityOptions::ClientCredentials(credentials) => format!(
                "client credentials (tenant {}, client {})",
                credentials.tenant_id, credentials.client_id
            ),
            IdentityOptions::StaticToken(_) => "static token".to_string(),
            IdentityOptions::Anonymous => "anonymous".to_string(),
        };

        vec![
            (ENV_GROUPS, self.groups.join(",")),
            (ENV_SUBSCRIPTION, self.subscription_id.clone()),
            (ENV_REPO_URL, self.repo_url.clone()),
            ("identity", identity),
            ("management_url", self.arm.management_url.clone()),
            ("max_attempts", self.dispatch.max_attempts.to_string()),
            ("retry_delay", format!("{:?}", self.dispatch.retry_delay)),
            ("attempt_timeout", format!("{:?}", self.dispatch.attempt_timeout)),
            ("batch_deadline", format!("{:?}", self.dispatch.batch_deadline)),
            ("max_concurrency", self.dispatch.max_concurrency.to_string()),
            ("check_source", self.check_source.to_string()),
        ]
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn identity(
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    access_token: Option<SecretString>,
) -> Result<IdentityOptions, FleetError> {
    if let Some(token) = access_token {
        return Ok(IdentityOptions::StaticToken(token));
    }

    let tenant_id = required(tenant_id);
    let client_id = required(client_id);
    match (tenant_id, client_id, client_secret) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => {
            Ok(IdentityOptions::ClientCredentials(ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
            }))
        }
        (None, None, None) => Ok(IdentityOptions::Anonymous),
        (tenant_id, client_id, client_secret) => {
            let mut missing = Vec::new();
            if tenant_id.is_none() {
                missing.push(ENV_TENANT_ID);
            }
            if client_id.is_none() {
                missing.push(ENV_CLIENT_ID);
            }
            if client_secret.is_none() {
                missing.push(ENV_CLIENT_SECRET);
            }
            Err(FleetError::ConfigError(format!(
                "Incomplete service principal, missing: {}",
                missing.join(", ")
            )))
        }
    }
}
