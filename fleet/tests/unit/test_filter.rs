//! Target filter tests

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kudufleet::discovery::directory::{ResourceDescriptor, ResourceDirectory, ResourcePage};
use kudufleet::discovery::filter::{filter_targets, MAX_PAGES};
use kudufleet::discovery::groups::resolve_groups;
use kudufleet::errors::{ErrorScope, FleetError};
use tokio_test::{assert_err, assert_ok};

use crate::common::{site, PagedDirectory};

#[tokio::test]
async fn test_selects_only_the_group() {
    let directory = PagedDirectory::new(vec![vec![
        site("fa-one", "g1"),
        site("fa-two", "g2"),
        site("fa-three", "g1"),
    ]]);

    let g1 = assert_ok!(filter_targets(&directory, "g1").await);
    assert_eq!(g1, vec!["fa-one", "fa-three"]);

    let g2 = assert_ok!(filter_targets(&directory, "g2").await);
    assert_eq!(g2, vec!["fa-two"]);
}

#[tokio::test]
async fn test_group_prefix_does_not_match() {
    let directory = PagedDirectory::new(vec![vec![site("fa-ten", "g10"), site("fa-one", "g1")]]);
    let targets = assert_ok!(filter_targets(&directory, "g1").await);
    assert_eq!(targets, vec!["fa-one"]);
}

#[tokio::test]
async fn test_drains_every_page() {
    let directory = PagedDirectory::new(vec![
        vec![site("fa-1", "g1"), site("fa-2", "g2")],
        vec![],
        vec![site("fa-3", "g1")],
    ]);

    let targets = assert_ok!(filter_targets(&directory, "g1").await);
    assert_eq!(targets, vec!["fa-1", "fa-3"]);
    assert_eq!(directory.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_no_match_is_empty() {
    let directory = PagedDirectory::new(vec![vec![site("fa-1", "g1")]]);
    let targets = assert_ok!(filter_targets(&directory, "g3").await);
    assert!(targets.is_empty());

    let empty = PagedDirectory::new(vec![]);
    let targets = assert_ok!(filter_targets(&empty, "g1").await);
    assert!(targets.is_empty());
}

#[tokio::test]
async fn test_listing_error_is_group_scoped() {
    let directory = PagedDirectory::new(vec![vec![site("fa-1", "g1")]])
        .failing_with(vec![FleetError::ArmError {
            status: 403,
            body: "AuthorizationFailed".to_string(),
        }]);

    let err = assert_err!(filter_targets(&directory, "g1").await);
    assert_eq!(err.scope(), ErrorScope::Group);

    // The next listing starts over
    let targets = assert_ok!(filter_targets(&directory, "g1").await);
    assert_eq!(targets, vec!["fa-1"]);
}

/// Directory whose listing never ends
#[derive(Default)]
struct EndlessDirectory {
    calls: AtomicUsize,
}

#[async_trait]
impl ResourceDirectory for EndlessDirectory {
    async fn list_page(&self, _cursor: Option<&str>) -> Result<ResourcePage, FleetError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResourcePage {
            resources: vec![ResourceDescriptor {
                name: format!("fa-{n}"),
                metadata: site(&format!("fa-{n}"), "g1"),
            }],
            next: Some(format!("page-{}", n + 1)),
        })
    }
}

#[tokio::test]
async fn test_cursor_loop_is_an_error() {
    let directory = EndlessDirectory::default();

    let err = assert_err!(filter_targets(&directory, "g1").await);
    assert!(matches!(err, FleetError::DirectoryError(_)));
    assert_eq!(err.scope(), ErrorScope::Group);
    assert_eq!(directory.calls.load(Ordering::SeqCst), MAX_PAGES);
}

#[test]
fn test_group_list_order_and_blanks() {
    assert_eq!(resolve_groups("rg-b, rg-a,,rg-b "), vec!["rg-b", "rg-a", "rg-b"]);
    assert!(resolve_groups(" , ").is_empty());
}
