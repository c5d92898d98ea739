//! Crawler module for document discovery
//!
//! This module contains the crawling logic, including:
//! - HTTP fetching with per-request timeouts
//! - HTML parsing and link extraction
//! - Content filters and hit counting
//! - The bounded-concurrency crawl loop

mod fetcher;
mod filter;
mod parser;
mod webcrawler;

pub use fetcher::{
    build_http_client, fetch_url, fetch_url_with_timeout, FetchResult, FetchedResource,
};
pub use filter::{Filter, FilterHits};
pub use parser::{parse_html, ParsedPage};
pub use webcrawler::{CrawlReport, CrawlerSettings, WebCrawler};
