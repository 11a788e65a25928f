//! Settings loading
//!
//! Layers, lowest precedence first: built-in defaults, an optional JSON
//! settings file, environment variables, `--key=value` arguments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::deploy::engine::DispatchOptions;
use crate::errors::FleetError;
use crate::http::client::ArmOptions;
use crate::logs::LogLevel;

pub const ENV_GROUPS: &str = "AZ_RG";
pub const ENV_SUBSCRIPTION: &str = "AZ_SUB_ID";
pub const ENV_REPO_URL: &str = "GIT_URL";
pub const ENV_CONFIG: &str = "KUDUFLEET_CONFIG";
pub const ENV_LOG_LEVEL: &str = "KUDUFLEET_LOG_LEVEL";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_NO_COLOR: &str = "NO_COLOR";

/// Arguments that do not map to a setting
const NON_SETTING_ARGS: &[&str] = &["config", "version"];

/// Tool settings
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// Mirror logs into this directory
    pub log_dir: Option<PathBuf>,

    /// Comma-separated resource groups
    pub resource_groups: Option<String>,

    /// Azure subscription id
    pub subscription_id: Option<String>,

    /// Git repository every target is redeployed from
    pub repo_url: Option<String>,

    /// Log the source control of each target before deploying
    pub check_source: bool,

    /// Colorize the report
    pub color: bool,

    /// Dispatch tuning
    pub dispatch: DispatchSettings,

    /// Azure endpoints and identity
    pub azure: AzureSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            resource_groups: None,
            subscription_id: None,
            repo_url: None,
            check_source: false,
            color: true,
            dispatch: DispatchSettings::default(),
            azure: AzureSettings::default(),
        }
    }
}

/// Dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub attempt_timeout_secs: u64,
    pub batch_deadline_secs: u64,

    /// 0 for no limit
    pub max_concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        let defaults = DispatchOptions::default();
        Self {
            max_attempts: defaults.max_attempts,
            retry_delay_secs: defaults.retry_delay.as_secs(),
            attempt_timeout_secs: defaults.attempt_timeout.as_secs(),
            batch_deadline_secs: defaults.batch_deadline.as_secs(),
            max_concurrency: defaults.max_concurrency,
        }
    }
}

/// Azure settings
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub management_url: String,
    pub login_url: String,
    pub api_version: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,

    /// Only read from the environment
    #[serde(skip)]
    pub client_secret: Option<SecretString>,

    /// Only read from the environment
    #[serde(skip)]
    pub access_token: Option<SecretString>,
}

impl Default for AzureSettings {
    fn default() -> Self {
        let arm = ArmOptions::default();
        Self {
            management_url: arm.management_url,
            login_url: "https://login.microsoftonline.com".to_string(),
            api_version: arm.api_version,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
        }
    }
}

impl Settings {
    /// Load settings from every layer.
    ///
    /// `env` looks up an environment variable; it is a parameter so callers
    /// can substitute the process environment.
    pub async fn load<E>(cli: &HashMap<String, String>, env: E) -> Result<Self, FleetError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let path = cli.get("config").cloned().or_else(|| env(ENV_CONFIG));
        let mut settings = match path {
            Some(path) => Self::read_file(Path::new(&path)).await?,
            None => Self::default(),
        };

        settings.apply_env(&env)?;
        settings.apply_cli(cli)?;
        Ok(settings)
    }

    /// Read a JSON settings file
    pub async fn read_file(path: &Path) -> Result<Self, FleetError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            FleetError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            FleetError::ConfigError(format!("Invalid settings file {}: {}", path.display(), e))
        })
    }

    fn apply_env<E>(&mut self, env: &E) -> Result<(), FleetError>
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env(ENV_GROUPS) {
            self.resource_groups = Some(value);
        }
        if let Some(value) = env(ENV_SUBSCRIPTION) {
            self.subscription_id = Some(value);
        }
        if let Some(value) = env(ENV_REPO_URL) {
            self.repo_url = Some(value);
        }
        if let Some(value) = env(ENV_LOG_LEVEL) {
            self.log_level = value.parse()?;
        }
        if env(ENV_NO_COLOR).is_some_and(|v| !v.is_empty()) {
            self.color = false;
        }
        if let Some(value) = env(ENV_TENANT_ID) {
            self.azure.tenant_id = Some(value);
        }
        if let Some(value) = env(ENV_CLIENT_ID) {
            self.azure.client_id = Some(value);
        }
        if let Some(value) = env(ENV_CLIENT_SECRET) {
            self.azure.client_secret = Some(SecretString::from(value));
        }
        if let Some(value) = env(ENV_ACCESS_TOKEN) {
            self.azure.access_token = Some(SecretString::from(value));
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &HashMap<String, String>) -> Result<(), FleetError> {
        for (key, value) in cli {
            match key.as_str() {
                "groups" => self.resource_groups = Some(value.clone()),
                "subscription" => self.subscription_id = Some(value.clone()),
                "repo-url" => self.repo_url = Some(value.clone()),
                "log-level" => self.log_level = value.parse()?,
                "json-logs" => self.json_logs = parse_value(key, value)?,
                "log-dir" => self.log_dir = Some(PathBuf::from(value)),
                "check-source" => self.check_source = parse_value(key, value)?,
                "no-color" => self.color = !parse_value::<bool>(key, value)?,
                "max-attempts" => self.dispatch.max_attempts = parse_value(key, value)?,
                "retry-delay-secs" => self.dispatch.retry_delay_secs = parse_value(key, value)?,
                "attempt-timeout-secs" => {
                    self.dispatch.attempt_timeout_secs = parse_value(key, value)?
                }
                "batch-deadline-secs" => {
                    self.dispatch.batch_deadline_secs = parse_value(key, value)?
                }
                "max-concurrency" => self.dispatch.max_concurrency = parse_value(key, value)?,
                "management-url" => self.azure.management_url = value.clone(),
                "login-url" => self.azure.login_url = value.clone(),
                "api-version" => self.azure.api_version = value.clone(),
                other if NON_SETTING_ARGS.contains(&other) => {}
                other => {
                    return Err(FleetError::ConfigError(format!("Unknown argument: --{}", other)))
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, FleetError> {
    value
        .trim()
        .parse()
        .map_err(|_| FleetError::ConfigError(format!("Invalid value for --{}: {}", key, value)))
}

/// Collect `--key=value` arguments; bare `--flag` arguments map to `"true"`.
///
/// Anything not starting with `--` is rejected.
pub fn parse_args<I>(args: I) -> Result<HashMap<String, String>, FleetError>
where
    I: IntoIterator<Item = String>,
{
    let mut cli_args = HashMap::new();

    for arg in args {
        let Some(flag) = arg.strip_prefix("--").filter(|f| !f.is_empty()) else {
            return Err(FleetError::ConfigError(format!("Unknown argument: {}", arg)));
        };
        match flag.split_once('=') {
            Some((key, value)) => cli_args.insert(key.to_string(), value.to_string()),
            None => cli_args.insert(flag.to_string(), "true".to_string()),
        };
    }

    Ok(cli_args)
}
