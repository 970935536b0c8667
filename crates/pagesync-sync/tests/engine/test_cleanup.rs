//! Orphan cleanup policies

use std::sync::atomic::Ordering;

use reqwest::StatusCode;

use pagesync_core::domain::Cleanup;
use pagesync_remote::RemoteError;
use pagesync_sync::PublishError;

use crate::common::*;

/// Root holding one page of the run and a mix of orphans
fn seeded() -> std::sync::Arc<FakeContentClient> {
    let fake = FakeContentClient::new();
    fake.seed(FakePage::new("p-a", "A", ROOT).managed("<p>a</p>"));
    fake.seed(FakePage::new("p-om", "Managed orphan", ROOT).managed("<p>om</p>"));
    fake.seed(FakePage::new("p-oc", "Orphan child", "p-om"));
    fake.seed(FakePage::new("p-of", "Foreign orphan", ROOT).with_body("<p>manual</p>"));
    fake.seed(
        FakePage::new("p-ot", "Other tenant orphan", ROOT)
            .managed("<p>ot</p>")
            .with_tenant("other"),
    );
    fake
}

fn deleted_pages(calls: &[Call]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|c| match c {
            Call::DeletePage { id } => Some(id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_cleanup_none_keeps_everything() {
    let fake = seeded();
    let tracker = RecordingTracker::new();

    uploader(fake.clone(), settings(None), tracker.clone(), Cleanup::None)
        .upload_pages(&[page("A", "<p>a</p>")], SPACE, ROOT)
        .await
        .unwrap();

    assert!(fake.calls().is_empty());
    assert_eq!(fake.child_lookups(), 0);
    assert_eq!(fake.page_count(), 5);
    assert_eq!(tracker.cleanup_finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cleanup_all_deletes_every_orphan_subtree() {
    let fake = seeded();
    let tracker = RecordingTracker::new();

    uploader(fake.clone(), settings(None), tracker.clone(), Cleanup::All)
        .upload_pages(&[page("A", "<p>a</p>")], SPACE, ROOT)
        .await
        .unwrap();

    let deleted = deleted_pages(&fake.calls());
    assert_eq!(deleted.len(), 4);
    let child = deleted.iter().position(|id| id == "p-oc").unwrap();
    let parent = deleted.iter().position(|id| id == "p-om").unwrap();
    assert!(child < parent, "children go first: {deleted:?}");

    assert_eq!(fake.page_count(), 1);
    assert!(fake.page("A").is_some());
    assert_eq!(tracker.deleted_ids(), vec!["p-oc", "p-of", "p-om", "p-ot"]);

    let reports = tracker.deleted.lock().unwrap().clone();
    let (orphan, subtree) = reports
        .iter()
        .find(|(orphan, _)| orphan.id == "p-om")
        .unwrap();
    assert_eq!(orphan.title, "Managed orphan");
    assert_eq!(subtree[0].id, "p-om");
    assert_eq!(subtree.len(), 2);
}

#[tokio::test]
async fn test_cleanup_managed_spares_foreign_pages() {
    let fake = seeded();
    let tracker = RecordingTracker::new();

    uploader(fake.clone(), settings(None), tracker.clone(), Cleanup::Managed)
        .upload_pages(&[page("A", "<p>a</p>")], SPACE, ROOT)
        .await
        .unwrap();

    let mut deleted = deleted_pages(&fake.calls());
    deleted.sort();
    assert_eq!(deleted, vec!["p-oc", "p-om"]);
    assert!(fake.page("Foreign orphan").is_some());
    assert!(fake.page("Other tenant orphan").is_some());
}

#[tokio::test]
async fn test_cleanup_managed_matches_tenant() {
    let fake = FakeContentClient::new();
    fake.seed(
        FakePage::new("p-blue", "Blue orphan", ROOT)
            .managed("<p>b</p>")
            .with_tenant("blue"),
    );
    fake.seed(FakePage::new("p-untagged", "Untagged orphan", ROOT).managed("<p>u</p>"));
    let tracker = RecordingTracker::new();

    uploader(fake.clone(), settings(Some("blue")), tracker, Cleanup::Managed)
        .upload_pages(&[page("A", "<p>a</p>")], SPACE, ROOT)
        .await
        .unwrap();

    assert_eq!(deleted_pages(&fake.calls()), vec!["p-blue"]);
    assert!(fake.page("Untagged orphan").is_some());
}

#[tokio::test]
async fn test_cleanup_reaches_nested_levels() {
    let fake = FakeContentClient::new();
    fake.seed(FakePage::new("p-a", "A", ROOT).managed("<p>a</p>"));
    fake.seed(FakePage::new("p-b", "B", "p-a").managed("<p>b</p>"));
    fake.seed(FakePage::new("p-stale", "Stale", "p-a").managed("<p>s</p>"));
    fake.seed(FakePage::new("p-leaf-orphan", "Leaf orphan", "p-b").managed("<p>l</p>"));
    let tracker = RecordingTracker::new();
    let tree = vec![page("A", "<p>a</p>").with_children(vec![page("B", "<p>b</p>")])];

    uploader(fake.clone(), settings(None), tracker.clone(), Cleanup::Managed)
        .upload_pages(&tree, SPACE, ROOT)
        .await
        .unwrap();

    let mut deleted = deleted_pages(&fake.calls());
    deleted.sort();
    assert_eq!(deleted, vec!["p-leaf-orphan", "p-stale"]);
    assert!(fake.page("B").is_some());
}

#[tokio::test]
async fn test_cleanup_failure_names_policy() {
    let fake = seeded();
    fake.fail_on("delete_page", StatusCode::FORBIDDEN);
    let tracker = RecordingTracker::new();

    let err = uploader(fake.clone(), settings(None), tracker.clone(), Cleanup::All)
        .upload_pages(&[page("A", "<p>a</p>")], SPACE, ROOT)
        .await
        .unwrap_err();

    match err.downcast_ref::<PublishError>() {
        Some(PublishError::Cleanup { policy, .. }) => assert_eq!(*policy, Cleanup::All),
        other => panic!("expected cleanup error, got {other:?}"),
    }
    assert!(err.to_string().contains("all"));
    let remote = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<RemoteError>())
        .expect("remote error in chain");
    assert_eq!(remote.status(), Some(StatusCode::FORBIDDEN));

    assert_eq!(tracker.uploads_finished.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.cleanup_finished.load(Ordering::SeqCst), 0);
}
