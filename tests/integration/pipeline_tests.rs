//! End-to-end tests: crawl, download and analyze under the watchdog

use crate::test_user_agent;
use docscan::config::{
    AnalyzerConfig, Config, CrawlerConfig, DownloaderConfig, FilterEntry, OutputConfig,
    WatchdogConfig,
};
use docscan::output::CollectingSink;
use docscan::pipeline::run_pipeline;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(start_url: String, download_dir: &std::path::Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            start_url,
            base_url: None,
            required_content: None,
            max_visited_pages: 10,
            max_parallel_downloads: 2,
            fetch_timeout_secs: 5,
            max_page_bytes: 1024 * 1024,
            expected_hits: None,
            filters: vec![FilterEntry {
                label: "pdf".to_string(),
                pattern: r"%PDF-1\.[0-7]".to_string(),
                target_hits: None,
            }],
        },
        downloader: DownloaderConfig {
            file_pattern: format!("{}/%{{h:2}}/%{{h}}.%{{s}}", download_dir.display()),
            max_parallel_downloads: 2,
            timeout_secs: 5,
            max_file_bytes: 1024 * 1024,
        },
        analyzer: AnalyzerConfig::default(),
        watchdog: WatchdogConfig {
            poll_interval_ms: 20,
            quiet_ticks: 2,
        },
        user_agent: test_user_agent(),
        output: OutputConfig::default(),
    }
}

#[tokio::test]
async fn test_pipeline_analyzes_crawled_documents() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/docs/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    r#"<html><body>
                    <a href="annual.pdf">Annual</a>
                    <a href="about.html">About</a>
                    <a href="broken.pdf">Broken</a>
                    </body></html>"#,
                ),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/annual.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.7\n1 0 obj << /Producer (TestWriter) >> endobj\n%%EOF".to_vec()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/about.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>No documents here</body></html>"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/broken.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(format!("{}/docs/index.html", server.uri()), dir.path());
    let sink = Arc::new(CollectingSink::new());

    let summary = tokio::time::timeout(Duration::from_secs(20), run_pipeline(&config, sink.clone()))
        .await
        .expect("Pipeline should terminate")
        .expect("Pipeline failed");

    assert_eq!(summary.crawl.fetch_attempts(), 4);
    assert_eq!(summary.crawl.failures, 1);
    assert_eq!(summary.crawl.hits, 1);
    assert_eq!(summary.download.successes, 1);
    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.analysis_failures, 0);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.attribute("format"), Some("pdf"));
    assert_eq!(report.attribute("version"), Some("1.7"));
    assert_eq!(
        report.attribute("url"),
        Some(format!("{}/docs/annual.pdf", server.uri()).as_str())
    );
    assert_eq!(
        report
            .child("meta")
            .and_then(|meta| meta.child("producer"))
            .map(|producer| producer.text.as_str()),
        Some("TestWriter")
    );
}

#[tokio::test]
async fn test_pipeline_terminates_when_start_page_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(format!("{}/missing.html", server.uri()), dir.path());
    let sink = Arc::new(CollectingSink::new());

    let summary = tokio::time::timeout(Duration::from_secs(20), run_pipeline(&config, sink.clone()))
        .await
        .expect("Pipeline should terminate")
        .expect("Pipeline failed");

    assert_eq!(summary.crawl.fetch_attempts(), 1);
    assert_eq!(summary.crawl.failures, 1);
    assert_eq!(summary.download.completed(), 0);
    assert_eq!(summary.dispatched(), 0);
    assert!(sink.reports().is_empty());
}
