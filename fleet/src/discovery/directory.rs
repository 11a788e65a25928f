//! Resource directory seam

use async_trait::async_trait;

use crate::errors::FleetError;

/// A candidate resource from the listing
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Resource name, used as the target identifier
    pub name: String,

    /// Full resource document as returned by the directory
    pub metadata: serde_json::Value,
}

/// One page of the listing
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    pub resources: Vec<ResourceDescriptor>,

    /// Cursor for the next page, `None` on the last one
    pub next: Option<String>,
}

/// Paginated inventory of deployable resources
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Fetch a page. `None` starts a fresh listing, otherwise `cursor` is the
    /// `next` value of the previous page.
    async fn list_page(&self, cursor: Option<&str>) -> Result<ResourcePage, FleetError>;
}
