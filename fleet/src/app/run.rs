//! Main application run loop

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, IdentityOptions};
use crate::authn::token_mngr::{StaticToken, TokenManager, TokenProvider};
use crate::deploy::engine::DispatchEngine;
use crate::deploy::transport::{DeployTransport, KuduTransport};
use crate::discovery::directory::ResourceDirectory;
use crate::discovery::filter::filter_targets;
use crate::discovery::source::{check_sources, SourceControlInspector};
use crate::endpoint::resolver::{resolve_endpoints, CredentialProvider};
use crate::errors::{ErrorScope, FleetError};
use crate::http::client::ArmClient;
use crate::models::deployment::{DeploymentRequest, Outcome};
use crate::report::text::TextReport;
use crate::report::{GroupReport, ReportSink};

/// Collaborators used to work through the groups
pub struct Services<'a> {
    pub directory: &'a dyn ResourceDirectory,
    pub credentials: &'a dyn CredentialProvider,

    /// Only set when source control should be logged before deploying
    pub inspector: Option<&'a dyn SourceControlInspector>,
}

/// Run kudufleet against Azure
pub async fn run(options: AppOptions) -> Result<(), FleetError> {
    info!("Initializing kudufleet...");

    let tokens = init_identity(
        options.identity,
        &options.login_url,
        &options.arm.management_url,
    )?;
    let arm = ArmClient::new(&options.arm, &options.subscription_id, tokens)?;
    let transport = Arc::new(KuduTransport::new(options.dispatch.attempt_timeout)?);
    let engine = DispatchEngine::new(transport, options.dispatch.clone());
    let request = Arc::new(DeploymentRequest::new(&options.repo_url)?);

    let services = Services {
        directory: &arm,
        credentials: &arm,
        inspector: options
            .check_source
            .then_some(&arm as &dyn SourceControlInspector),
    };

    let mut report = TextReport::new(std::io::stdout(), options.color);
    let reports = deploy_groups(&options.groups, &services, &engine, request, &mut report).await?;
    report.into_inner().flush()?;

    let (succeeded, failed) = reports
        .iter()
        .fold((0, 0), |(s, f), r| (s + r.succeeded(), f + r.failed()));
    info!(
        "Processed {} resource groups: {} deployments succeeded, {} failed",
        reports.len(),
        succeeded,
        failed
    );
    Ok(())
}

fn init_identity(
    identity: IdentityOptions,
    login_url: &str,
    management_url: &str,
) -> Result<Option<Arc<dyn TokenProvider>>, FleetError> {
    let provider: Arc<dyn TokenProvider> = match identity {
        IdentityOptions::ClientCredentials(credentials) => {
            info!("Authenticating to ARM as client {}", credentials.client_id);
            Arc::new(TokenManager::new(login_url, management_url, credentials)?)
        }
        IdentityOptions::StaticToken(token) => Arc::new(StaticToken::new(token.expose_secret())),
        IdentityOptions::Anonymous => {
            warn!("No Azure identity configured, ARM requests are sent unauthenticated");
            return Ok(None);
        }
    };
    Ok(Some(provider))
}

/// Deploy every group in order, rendering each one as soon as it is done.
///
/// A group whose targets cannot be listed is reported and skipped; only
/// process-scoped errors end the run early.
pub async fn deploy_groups<T, S, F>(
    groups: &[String],
    services: &Services<'_>,
    engine: &DispatchEngine<T, S>,
    request: Arc<DeploymentRequest>,
    sink: &mut dyn ReportSink,
) -> Result<Vec<GroupReport>, FleetError>
where
    T: DeployTransport + ?Sized + 'static,
    S: Fn(Duration) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let total = groups.len();
    let mut reports = Vec::with_capacity(total);

    for (i, group) in groups.iter().enumerate() {
        let report = deploy_group(i + 1, total, group, services, engine, Arc::clone(&request)).await?;
        sink.render_group(&report);
        reports.push(report);
    }

    Ok(reports)
}

async fn deploy_group<T, S, F>(
    index: usize,
    total: usize,
    group: &str,
    services: &Services<'_>,
    engine: &DispatchEngine<T, S>,
    request: Arc<DeploymentRequest>,
) -> Result<GroupReport, FleetError>
where
    T: DeployTransport + ?Sized + 'static,
    S: Fn(Duration) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let mut report = GroupReport::new(index, total, group);
    info!("Listing function apps for resource group: {} - {}", index, group);

    let targets = match filter_targets(services.directory, group).await {
        Ok(targets) => targets,
        Err(e) if e.scope() == ErrorScope::Process => return Err(e),
        Err(e) => {
            error!("Unable to list function apps of {}: {}", group, e);
            report.listing_error = Some(e.to_string());
            return Ok(report);
        }
    };
    if targets.is_empty() {
        info!("No function apps found in {}", group);
        return Ok(report);
    }
    info!("Found {} function apps in {}: {}", targets.len(), group, targets.join(", "));

    if let Some(inspector) = services.inspector {
        check_sources(inspector, group, &targets).await;
    }

    let resolved = resolve_endpoints(services.credentials, group, &targets).await;
    report.outcomes.extend(
        resolved
            .failures
            .into_iter()
            .map(|(target, e)| Outcome::resolution_failed(target, e.to_string())),
    );

    let outcomes = engine.dispatch(request, resolved.endpoints).await;
    report.outcomes.extend(outcomes);
    Ok(report)
}
