//! Endpoint resolution through the credential provider

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::errors::{FleetError, ResolveError};

/// Source of per-target deployment endpoints
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Raw endpoint URI for `target` in `group`
    async fn get_endpoint(&self, group: &str, target: &str) -> Result<String, FleetError>;
}

/// Endpoints for one group, split into dispatchable and failed targets
#[derive(Debug, Default)]
pub struct ResolvedEndpoints {
    pub endpoints: HashMap<String, Endpoint>,
    pub failures: Vec<(String, ResolveError)>,
}

/// Look up and normalize the endpoint of a single target
pub async fn resolve_endpoint<C>(
    provider: &C,
    group: &str,
    target: &str,
) -> Result<Endpoint, ResolveError>
where
    C: CredentialProvider + ?Sized,
{
    let raw = provider
        .get_endpoint(group, target)
        .await
        .map_err(ResolveError::Lookup)?;
    Endpoint::parse(&raw)
}

/// Resolve every target of a group, one after the other.
///
/// Duplicate target names are resolved once.
pub async fn resolve_endpoints<C>(provider: &C, group: &str, targets: &[String]) -> ResolvedEndpoints
where
    C: CredentialProvider + ?Sized,
{
    let mut resolved = ResolvedEndpoints::default();

    for target in targets {
        if resolved.endpoints.contains_key(target)
            || resolved.failures.iter().any(|(name, _)| name == target)
        {
            continue;
        }

        match resolve_endpoint(provider, group, target).await {
            Ok(endpoint) => {
                debug!("Endpoint for {}: {}", target, endpoint);
                resolved.endpoints.insert(target.clone(), endpoint);
            }
            Err(e) => {
                warn!("No endpoint for {} in {}: {}", target, group, e);
                resolved.failures.push((target.clone(), e));
            }
        }
    }

    resolved
}
