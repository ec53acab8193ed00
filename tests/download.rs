//! Object downloads into a temporary directory

mod common;

use cloudctl::download::{download, DownloadRequest};
use cloudctl::resource::Severity;
use common::{denied, object, FakeClient};
use std::sync::Arc;

fn request(key: &str, destination: &std::path::Path, recursive: bool) -> DownloadRequest {
    DownloadRequest {
        bucket: "logs".to_string(),
        key: key.to_string(),
        destination: destination.to_path_buf(),
        recursive,
    }
}

/// Test that a single key is written under its file name in the destination
#[tokio::test]
async fn test_single_object_lands_in_destination() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::default().object("2021/09/app.log", Ok(b"hello".to_vec()));

    let report = download(Arc::new(client), &request("2021/09/app.log", dir.path(), false)).await;

    assert!(report.status.is_none());
    assert_eq!(report.total_bytes(), 5);
    let written = std::fs::read(dir.path().join("app.log")).unwrap();
    assert_eq!(written, b"hello");
}

/// Test that a recursive get recreates the key hierarchy and skips folder markers
#[tokio::test]
async fn test_recursive_keeps_key_tree() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::with_pages(vec![Ok(vec![
        object("2021/", 0),
        object("2021/a.log", 1),
        object("2021/09/b.log", 2),
        object("2022/c.log", 3),
    ])])
    .object("2021/a.log", Ok(b"a".to_vec()))
    .object("2021/09/b.log", Ok(b"bb".to_vec()));

    let report = download(Arc::new(client), &request("2021/", dir.path(), true)).await;

    assert!(report.status.is_none());
    assert_eq!(report.transfers.len(), 2);
    assert!(dir.path().join("2021/a.log").is_file());
    assert_eq!(std::fs::read(dir.path().join("2021/09/b.log")).unwrap(), b"bb");
    assert!(!dir.path().join("2022").exists());
}

/// Test that one failed object makes the whole download a partial result
#[tokio::test]
async fn test_one_failed_transfer_is_partial() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::with_pages(vec![Ok(vec![object("x/ok", 2), object("x/secret", 2)])])
        .object("x/ok", Ok(b"ok".to_vec()))
        .object("x/secret", Err(denied("storage.objects.get denied")));

    let report = download(Arc::new(client), &request("x/", dir.path(), true)).await;

    let status = report.status.expect("partial status");
    assert_eq!(status.severity, Severity::Warn);
    assert_eq!(status.message, "1 of 2 downloads failed");
    let failed: Vec<_> = report.transfers.iter().filter(|t| !t.succeeded()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source, "gs://logs/x/secret");
}

/// Test that a missing key is reported as an error with the provider code
#[tokio::test]
async fn test_missing_object_is_error() {
    let dir = tempfile::tempdir().unwrap();

    let report = download(
        Arc::new(FakeClient::default()),
        &request("nope.txt", dir.path(), false),
    )
    .await;

    assert_eq!(report.status.unwrap().severity, Severity::Error);
    assert_eq!(
        report.transfers[0].error.as_ref().unwrap().metadata["code"],
        "notFound"
    );
}

/// Test that a prefix with no objects warns instead of failing
#[tokio::test]
async fn test_empty_prefix_warns() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::with_pages(vec![Ok(Vec::new())]);

    let report = download(Arc::new(client), &request("none/", dir.path(), true)).await;

    assert!(report.transfers.is_empty());
    let status = report.status.unwrap();
    assert_eq!(status.severity, Severity::Warn);
    assert!(status.message.contains("gs://logs/none/"));
}
