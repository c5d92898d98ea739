//! Integration tests for DocScan
//!
//! HTTP-facing components run against wiremock servers; analyzer fixtures are
//! generated on the fly.

mod crawl_tests;
mod dispatch_tests;
mod download_tests;
mod pipeline_tests;

use docscan::config::UserAgentConfig;

pub fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

pub fn test_client() -> reqwest::Client {
    docscan::crawler::build_http_client(&test_user_agent()).expect("Failed to build client")
}
