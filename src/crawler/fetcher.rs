//! HTTP fetcher shared by the crawler and the downloader
//!
//! This module handles:
//! - Building the HTTP client with a proper user agent string
//! - GET requests returning the raw body and its Content-Type
//! - Per-request timeouts
//! - A ceiling on the body size read into memory
//! - Error classification

use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Raw body
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// Returns true if the resource looks like an HTML page
    ///
    /// An explicit HTML or XHTML content type counts, as does a missing content
    /// type with a body starting with `<`.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(content_type) => {
                let content_type = content_type.to_ascii_lowercase();
                content_type.contains("text/html") || content_type.contains("application/xhtml")
            }
            None => self
                .body
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .map_or(false, |&b| b == b'<'),
        }
    }
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the resource
    Success(FetchedResource),

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, broken transfer, ...)
    NetworkError {
        /// Error description
        error: String,
    },

    /// The per-request timer expired; the transfer was aborted
    Timeout,

    /// The body grew past the size limit; the transfer was aborted
    TooLarge {
        /// Limit in bytes
        limit: u64,
    },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }
}

/// Builds an HTTP client with proper configuration
///
/// Timeouts are not set on the client: every fetch carries its own timer
/// (see [`fetch_url_with_timeout`]).
///
/// # Example
///
/// ```no_run
/// use docscan::config::UserAgentConfig;
/// use docscan::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "DocScan".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and returns its raw body
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Success` |
/// | Other status | `HttpError` |
/// | Timeout inside reqwest | `Timeout` |
/// | Connection refused, TLS error, broken body | `NetworkError` |
/// | Body (announced or received) above `max_body` bytes | `TooLarge` |
pub async fn fetch_url(client: &Client, url: &Url, max_body: u64) -> FetchResult {
    let mut response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if response.content_length().is_some_and(|length| length > max_body) {
        return FetchResult::TooLarge { limit: max_body };
    }

    // Content-Length may be absent or wrong, so the limit also applies while reading
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if (body.len() + chunk.len()) as u64 > max_body {
                    return FetchResult::TooLarge { limit: max_body };
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => return classify_error(e),
        }
    }

    FetchResult::Success(FetchedResource {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    })
}

/// Fetches a URL under an independent timer
///
/// When the timer expires the request future is dropped, which aborts the
/// underlying transfer.
pub async fn fetch_url_with_timeout(
    client: &Client,
    url: &Url,
    timeout: Duration,
    max_body: u64,
) -> FetchResult {
    match tokio::time::timeout(timeout, fetch_url(client, url, max_body)).await {
        Ok(result) => result,
        Err(_) => FetchResult::Timeout,
    }
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::Timeout
    } else if e.is_connect() {
        FetchResult::NetworkError {
            error: format!("Connection failed: {}", e),
        }
    } else {
        FetchResult::NetworkError {
            error: e.to_string(),
        }
    }
}
