//! Group membership filter

use serde_json::Value;
use tracing::{debug, info};

use crate::discovery::directory::ResourceDirectory;
use crate::errors::FleetError;

/// Metadata key holding the hosting plan resource id
const PLAN_KEY: &str = "serverFarmId";

/// Upper bound on pages drained for a single listing
pub const MAX_PAGES: usize = 1000;

/// Drain the directory listing and return the names of the resources whose
/// hosting plan belongs to `group`, in listing order.
pub async fn filter_targets<D>(directory: &D, group: &str) -> Result<Vec<String>, FleetError>
where
    D: ResourceDirectory + ?Sized,
{
    let mut targets = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    let mut seen = 0usize;

    loop {
        if pages == MAX_PAGES {
            return Err(FleetError::DirectoryError(format!(
                "listing did not end after {} pages",
                MAX_PAGES
            )));
        }

        let page = directory.list_page(cursor.as_deref()).await?;
        pages += 1;
        seen += page.resources.len();

        for resource in &page.resources {
            if references_group(&resource.metadata, group) {
                debug!("{} belongs to {}", resource.name, group);
                targets.push(resource.name.clone());
            }
        }

        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(
        "Resource group {}: {} of {} listed resources match ({} pages)",
        group,
        targets.len(),
        seen,
        pages
    );
    Ok(targets)
}

/// True when any `serverFarmId` in the metadata names a plan inside `group`.
///
/// The comparison works on whole path segments, ignoring ASCII case.
pub fn references_group(metadata: &Value, group: &str) -> bool {
    let mut plans = Vec::new();
    collect_plan_ids(metadata, &mut plans);
    plans.iter().any(|plan| plan_in_group(plan, group))
}

fn collect_plan_ids<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.eq_ignore_ascii_case(PLAN_KEY) {
                    if let Value::String(plan) = child {
                        out.push(plan);
                        continue;
                    }
                }
                collect_plan_ids(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_plan_ids(item, out);
            }
        }
        _ => {}
    }
}

/// `/subscriptions/<sub>/resourceGroups/<group>/...`
fn plan_in_group(plan_id: &str, group: &str) -> bool {
    let mut segments = plan_id.trim_start_matches('/').split('/');
    let subscriptions = segments.next();
    let subscription = segments.next();
    let groups = segments.next();
    let name = segments.next();

    matches!(subscriptions, Some(s) if s.eq_ignore_ascii_case("subscriptions"))
        && matches!(subscription, Some(s) if !s.is_empty())
        && matches!(groups, Some(s) if s.eq_ignore_ascii_case("resourceGroups"))
        && matches!(name, Some(s) if s.eq_ignore_ascii_case(group))
}
