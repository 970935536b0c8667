//! Dry-run publishing over a live store

use std::sync::Arc;

use serde_json::json;

use pagesync_core::domain::{Cleanup, Expansion, RemoteProperty};
use pagesync_core::ports::{ContentClient, NewPage};
use pagesync_sync::dry_run::PLACEHOLDER_ID;
use pagesync_sync::DryRunClient;

use crate::common::*;

fn dry_run(fake: &Arc<FakeContentClient>) -> Arc<dyn ContentClient> {
    Arc::new(DryRunClient::new(fake.clone()))
}

#[tokio::test]
async fn test_dry_run_reports_without_writing() {
    let fake = FakeContentClient::new();
    fake.seed(FakePage::new("p-m", "Moved", "elsewhere").managed("<p>m</p>").with_version(7));
    fake.seed(FakePage::new("p-x", "Orphan", ROOT).managed("<p>x</p>"));
    let tracker = RecordingTracker::new();
    let tree = vec![
        page("A", "<p>a</p>").with_children(vec![page("B", "<p>b</p>")]),
        page("Moved", "<p>m</p>"),
    ];

    uploader(dry_run(&fake), settings(None), tracker.clone(), Cleanup::All)
        .upload_pages(&tree, SPACE, ROOT)
        .await
        .unwrap();

    assert!(fake.calls().is_empty());
    assert_eq!(fake.page_count(), 2);
    assert_eq!(fake.page("Moved").unwrap().version, 7);

    let kinds = tracker.kinds();
    assert_eq!(kinds["A"], "created");
    assert_eq!(kinds["B"], "created");
    assert_eq!(kinds["Moved"], "location_modified");

    let b = tracker.outcome("B");
    let server_page = b.result.server_page().unwrap();
    assert_eq!(server_page.parent_id.as_deref(), Some(PLACEHOLDER_ID));

    // Orphans are still reported
    assert_eq!(tracker.deleted_ids(), vec!["p-x"]);
    assert!(fake.page("Orphan").is_some());
}

#[tokio::test]
async fn test_placeholder_has_no_children() {
    let fake = FakeContentClient::new();
    let client = dry_run(&fake);

    let children = client
        .find_child_pages(PLACEHOLDER_ID, &[Expansion::Version])
        .await
        .unwrap();

    assert!(children.is_empty());
    assert_eq!(fake.child_lookups(), 0);
}

#[tokio::test]
async fn test_reads_are_forwarded() {
    let fake = FakeContentClient::new();
    fake.seed(FakePage::new("p-a", "A", ROOT).with_labels(&["x"]));
    let client = dry_run(&fake);

    let found = client
        .find_page(SPACE, "A", &[Expansion::Labels])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].labels.as_deref(), Some(&["x".to_string()][..]));
    assert_eq!(client.list_labels("p-a").await.unwrap(), vec!["x"]);
    assert_eq!(client.space_home_page(SPACE).await.unwrap(), ROOT);
}

#[tokio::test]
async fn test_synthesized_results_echo_input() {
    let fake = FakeContentClient::new();
    let client = dry_run(&fake);

    let created = client
        .create_page(&NewPage {
            space: SPACE.into(),
            parent_id: "parent-1".into(),
            title: "New".into(),
            body: "<p/>".into(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, PLACEHOLDER_ID);
    assert_eq!(created.title, "New");
    assert_eq!(created.version, Some(1));
    assert_eq!(created.parent_id.as_deref(), Some("parent-1"));

    let current = RemoteProperty {
        key: "owner".into(),
        value: json!("a"),
        version: 3,
    };
    let updated = client
        .update_property("p-a", &current, &json!("b"))
        .await
        .unwrap();
    assert_eq!(updated.version, 4);
    assert_eq!(updated.value, json!("b"));

    client.delete_page("p-a").await.unwrap();
    assert!(fake.calls().is_empty());
}
