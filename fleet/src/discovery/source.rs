//! Source-control inspection
//!
//! Logs how each target is currently wired to source control before it is
//! redeployed. Purely informational; failures never block a deployment.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::FleetError;

/// Describes the source control configured on a target
#[async_trait]
pub trait SourceControlInspector: Send + Sync {
    async fn describe_source(&self, group: &str, target: &str) -> Result<String, FleetError>;
}

/// Log the source control of every target, returning how many were described
pub async fn check_sources<I>(inspector: &I, group: &str, targets: &[String]) -> usize
where
    I: SourceControlInspector + ?Sized,
{
    let mut described = 0;
    for target in targets {
        match inspector.describe_source(group, target).await {
            Ok(source) => {
                info!("{} : {}", target, source);
                described += 1;
            }
            Err(e) => warn!("Unable to read source control of {}: {}", target, e),
        }
    }
    described
}
