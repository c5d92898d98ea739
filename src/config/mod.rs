//! Configuration module for DocScan
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docscan::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docscan.toml")).unwrap();
//! println!("Crawl starts at: {}", config.crawler.start_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnalyzerConfig, Config, CrawlerConfig, DownloaderConfig, FilterEntry, OutputConfig,
    TextExtraction, UserAgentConfig, ValidatorConfig, WatchdogConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
