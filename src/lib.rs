//! DocScan: document discovery and provenance analysis
//!
//! This crate discovers documents by crawling the web (or accepts them directly),
//! downloads them with bounded concurrency, and routes every file to a
//! format-specific analyzer that extracts technical metadata.

pub mod analyzer;
pub mod config;
pub mod crawler;
pub mod downloader;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod url;
pub mod watchdog;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for DocScan operations
#[derive(Debug, Error)]
pub enum DocScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Analysis of {path} failed: {message}")]
    Analyzer { path: PathBuf, message: String },

    #[error("Decompression of {path} with '{tool}' failed: {message}")]
    Decompress {
        path: PathBuf,
        tool: String,
        message: String,
    },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::PageState,
        to: state::PageState,
    },

    #[error("Component channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for DocScan operations
pub type Result<T> = std::result::Result<T, DocScanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analyzer::{Analyzer, FileFormat, Multiplexer};
pub use config::Config;
pub use crawler::WebCrawler;
pub use downloader::Downloader;
pub use state::PageState;
pub use crate::url::{normalize_url, NormalizedUrl};
pub use watchdog::{Watchable, WatchDog};
