//! Integration tests for the download scheduler

use crate::test_client;
use docscan::downloader::{Downloader, DownloaderSettings};
use docscan::normalize_url;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_in(dir: &std::path::Path) -> DownloaderSettings {
    DownloaderSettings::new(&format!("{}/%{{h:2}}/%{{h}}.%{{s}}", dir.display()))
}

#[tokio::test]
async fn test_resubmission_is_deduplicated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.6\n%%EOF".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::spawn(test_client(), settings_in(dir.path())).unwrap();

    // Three spellings of the same resource
    for spelling in ["/report.pdf", "/report.pdf#page=3", "/./report.pdf"] {
        let url = normalize_url(&format!("{}{}", server.uri(), spelling), None).unwrap();
        downloader.download(url).unwrap();
    }

    let (handle, mut downloaded, task) = downloader.into_parts();
    drop(handle);

    let file = downloaded.recv().await.expect("one download");
    assert_eq!(file.path.extension().and_then(|e| e.to_str()), Some("pdf"));
    assert!(file.path.starts_with(dir.path()));
    assert!(downloaded.recv().await.is_none());

    let report = task.await.unwrap();
    assert_eq!(report.successes, 1);
    assert_eq!(report.duplicates, 2);
}

#[tokio::test]
async fn test_parallel_downloads_are_bounded() {
    let server = MockServer::start().await;
    for index in 0..6 {
        Mock::given(method("GET"))
            .and(path(format!("/doc{}.pdf", index)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(format!("%PDF-1.4 document {}", index).into_bytes())
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_in(dir.path());
    settings.max_parallel_downloads = 2;

    let started = Instant::now();
    let downloader = Downloader::spawn(test_client(), settings).unwrap();
    for index in 0..6 {
        let url = normalize_url(&format!("{}/doc{}.pdf", server.uri(), index), None).unwrap();
        downloader.download(url).unwrap();
    }

    let (handle, mut downloaded, task) = downloader.into_parts();

    // Sample the scheduler while it works through the backlog
    let mut received = 0;
    while received < 6 && started.elapsed() < Duration::from_secs(10) {
        let snapshot = handle.report().await.unwrap();
        assert!(
            snapshot.in_flight <= 2,
            "{} downloads in flight",
            snapshot.in_flight
        );

        if let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_millis(50), downloaded.recv()).await
        {
            received += 1;
        }
    }
    drop(handle);
    assert_eq!(received, 6);

    let report = task.await.unwrap();
    assert_eq!(report.successes, 6);
    assert_eq!(report.queued, 0);

    // Three waves of two 300ms downloads
    assert!(started.elapsed() >= Duration::from_millis(850));
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.4".to_vec())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quick.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_in(dir.path());
    settings.max_parallel_downloads = 1;
    settings.timeout = Duration::from_millis(200);

    let downloader = Downloader::spawn(test_client(), settings).unwrap();
    for name in ["slow.pdf", "quick.pdf"] {
        let url = normalize_url(&format!("{}/{}", server.uri(), name), None).unwrap();
        downloader.download(url).unwrap();
    }

    let (handle, mut downloaded, task) = downloader.into_parts();
    drop(handle);

    let file = tokio::time::timeout(Duration::from_secs(3), downloaded.recv())
        .await
        .expect("quick download should not wait for the slow one")
        .expect("quick download");
    assert!(file.url.as_str().ends_with("/quick.pdf"));

    let report = task.await.unwrap();
    assert_eq!(report.successes, 1);
    assert_eq!(report.failures, 1);
    assert_eq!(report.in_flight, 0);
}

#[tokio::test]
async fn test_oversized_file_is_not_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 8192]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_in(dir.path());
    settings.max_file_bytes = 1024;

    let downloader = Downloader::spawn(test_client(), settings).unwrap();
    let url = normalize_url(&format!("{}/large.pdf", server.uri()), None).unwrap();
    downloader.download(url).unwrap();

    let (handle, mut downloaded, task) = downloader.into_parts();
    drop(handle);

    assert!(downloaded.recv().await.is_none());
    let report = task.await.unwrap();
    assert_eq!(report.successes, 0);
    assert_eq!(report.failures, 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
