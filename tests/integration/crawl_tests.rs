//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run complete
//! crawls against them.

use crate::test_client;
use docscan::crawler::{CrawlerSettings, Filter, WebCrawler};
use docscan::normalize_url;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(body)
}

#[tokio::test]
async fn test_same_origin_hit_and_external_link() {
    let site = MockServer::start().await;
    let elsewhere = MockServer::start().await;

    // Page A links to same-origin B and off-origin C
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(format!(
            r#"<html><body><a href="/b">next</a> <a href="{}/c">elsewhere</a></body></html>"#,
            elsewhere.uri()
        )))
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("<html><body>quarterly report</body></html>".to_string()))
        .mount(&site)
        .await;

    // C must never be fetched
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html("<html><body>report</body></html>".to_string()))
        .expect(0)
        .mount(&elsewhere)
        .await;

    let start = normalize_url(&format!("{}/a", site.uri()), None).unwrap();
    let mut settings = CrawlerSettings::new(start.clone());
    settings.max_visited_pages = 10;
    settings.max_parallel_downloads = 2;
    settings.filters = vec![Filter::new("report", "report", None).unwrap()];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = WebCrawler::new(test_client(), settings, tx)
        .start_search(None)
        .await
        .expect("Crawl task failed");

    let b = normalize_url(&format!("{}/b", site.uri()), None).unwrap();
    let c = normalize_url(&format!("{}/c", elsewhere.uri()), None).unwrap();

    assert_eq!(report.visited.len(), 2);
    assert!(report.visited.contains(&start));
    assert!(report.visited.contains(&b));
    assert!(!report.visited.contains(&c));
    assert!(report.discovered_external.contains(&c));

    assert_eq!(report.hits, 1);
    assert_eq!(report.filter_hits.len(), 1);
    assert_eq!(report.filter_hits[0].hits, 1);

    assert_eq!(rx.recv().await, Some(b));
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn test_page_budget_on_cyclic_graph() {
    let server = MockServer::start().await;

    // A ring of 12 pages, each linking to its successor and back to the first
    for page in 0..12 {
        Mock::given(method("GET"))
            .and(path(format!("/p{}", page)))
            .respond_with(html(format!(
                r#"<a href="/p{}">next</a> <a href="/p0">home</a>"#,
                (page + 1) % 12
            )))
            .mount(&server)
            .await;
    }

    let start = normalize_url(&format!("{}/p0", server.uri()), None).unwrap();
    let mut settings = CrawlerSettings::new(start);
    settings.max_visited_pages = 4;
    settings.max_parallel_downloads = 3;

    let (tx, _rx) = mpsc::unbounded_channel();
    let report = WebCrawler::new(test_client(), settings, tx)
        .start_search(None)
        .await
        .expect("Crawl task failed");

    assert_eq!(report.fetch_attempts(), 4);
    let requests = server.received_requests().await.unwrap();
    assert!(
        requests.len() <= 4,
        "Expected at most 4 fetches, got {}",
        requests.len()
    );
}

#[tokio::test]
async fn test_timed_out_fetch_frees_its_slot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(html(
            r#"<a href="slow.html">slow</a> <a href="fast.html">fast</a>"#.to_string(),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow.html"))
        .respond_with(html("too late".to_string()).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fast.html"))
        .respond_with(html("in time".to_string()))
        .mount(&server)
        .await;

    let start = normalize_url(&format!("{}/index.html", server.uri()), None).unwrap();
    let mut settings = CrawlerSettings::new(start);
    settings.max_parallel_downloads = 1;
    settings.fetch_timeout = Duration::from_millis(300);

    let (tx, _rx) = mpsc::unbounded_channel();
    let report = tokio::time::timeout(
        Duration::from_secs(4),
        WebCrawler::new(test_client(), settings, tx).start_search(None),
    )
    .await
    .expect("Crawl should not wait for the slow page")
    .expect("Crawl task failed");

    assert_eq!(report.fetch_attempts(), 3);
    assert_eq!(report.successes, 2);
    assert_eq!(report.failures, 1);
}

#[tokio::test]
async fn test_expected_hits_stop_admission() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(html("match me".to_string() + r#" <a href="more.html">more</a>"#))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/more.html"))
        .respond_with(html("match me too".to_string()))
        .expect(0)
        .mount(&server)
        .await;

    let start = normalize_url(&format!("{}/index.html", server.uri()), None).unwrap();
    let mut settings = CrawlerSettings::new(start);
    settings.filters = vec![Filter::new("match", "match", None).unwrap()];

    let (tx, _rx) = mpsc::unbounded_channel();
    let report = WebCrawler::new(test_client(), settings, tx)
        .start_search(Some(1))
        .await
        .expect("Crawl task failed");

    assert_eq!(report.hits, 1);
    assert_eq!(report.fetch_attempts(), 1);
}

/// Slow leaf page that records when each request arrived
#[derive(Clone)]
struct SlowLeaf {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowLeaf {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        html("<html><body>leaf</body></html>".to_string()).set_delay(self.delay)
    }
}

#[tokio::test]
async fn test_parallel_fetches_stay_within_limit() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(300);
    let leaf = SlowLeaf {
        delay,
        arrivals: Arc::new(Mutex::new(Vec::new())),
    };

    let links: String = (0..8)
        .map(|n| format!(r#"<a href="/leaf{}">leaf {}</a> "#, n, n))
        .collect();
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(html(format!("<html><body>{}</body></html>", links)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/leaf\d+$"))
        .respond_with(leaf.clone())
        .mount(&server)
        .await;

    let start = normalize_url(&format!("{}/index.html", server.uri()), None).unwrap();
    let mut settings = CrawlerSettings::new(start);
    settings.max_visited_pages = 20;
    settings.max_parallel_downloads = 2;

    let (tx, _rx) = mpsc::unbounded_channel();
    let report = WebCrawler::new(test_client(), settings, tx)
        .start_search(None)
        .await
        .expect("Crawl task failed");

    assert_eq!(report.fetch_attempts(), 9);
    assert_eq!(report.failures, 0);

    // A leaf is in flight for `delay` after it arrives; a slot only frees up
    // once its response is complete
    let arrivals = leaf.arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 8);
    let window = delay - Duration::from_millis(50);
    let peak = arrivals
        .iter()
        .map(|at| {
            arrivals
                .iter()
                .filter(|other| *other <= at && at.duration_since(**other) < window)
                .count()
        })
        .max()
        .unwrap();
    assert!(peak <= 2, "{} leaf fetches overlapped", peak);
}
