use crate::config::types::{
    Config, CrawlerConfig, DownloaderConfig, FilterEntry, UserAgentConfig, WatchdogConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_downloader_config(&config.downloader)?;
    validate_watchdog_config(&config.watchdog)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_http_url("start-url", &config.start_url)?;

    if let Some(base_url) = &config.base_url {
        validate_http_url("base-url", base_url)?;
    }

    if let Some(required) = &config.required_content {
        validate_regex("required-content", required)?;
    }

    validate_parallelism(config.max_parallel_downloads)?;

    if config.max_visited_pages < 1 {
        return Err(ConfigError::Validation(
            "max-visited-pages must be >= 1".to_string(),
        ));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_page_bytes < 1 {
        return Err(ConfigError::Validation(
            "max-page-bytes must be >= 1".to_string(),
        ));
    }

    validate_filters(&config.filters)?;

    Ok(())
}

/// Validates content filter entries
fn validate_filters(filters: &[FilterEntry]) -> Result<(), ConfigError> {
    for filter in filters {
        if filter.label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "filter label cannot be empty".to_string(),
            ));
        }

        validate_regex(&filter.label, &filter.pattern)?;

        if filter.target_hits == Some(0) {
            return Err(ConfigError::Validation(format!(
                "filter '{}' has target-hits = 0",
                filter.label
            )));
        }
    }

    Ok(())
}

/// Validates downloader configuration
fn validate_downloader_config(config: &DownloaderConfig) -> Result<(), ConfigError> {
    validate_parallelism(config.max_parallel_downloads)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "downloader timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_file_bytes < 1 {
        return Err(ConfigError::Validation(
            "max-file-bytes must be >= 1".to_string(),
        ));
    }

    // Without a content-dependent token every download would land on the same path
    if !config.file_pattern.contains("%{h") && !config.file_pattern.contains("%{s}") {
        return Err(ConfigError::InvalidPattern(format!(
            "file-pattern '{}' must contain a %{{h}} or %{{s}} token",
            config.file_pattern
        )));
    }

    Ok(())
}

/// Validates watchdog configuration
fn validate_watchdog_config(config: &WatchdogConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "poll-interval-ms must be >= 10ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    if config.quiet_ticks < 1 {
        return Err(ConfigError::Validation(
            "quiet-ticks must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_parallelism(value: usize) -> Result<(), ConfigError> {
    if !(1..=100).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "max-parallel-downloads must be between 1 and 100, got {}",
            value
        )));
    }
    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            key, value
        )));
    }

    Ok(())
}

fn validate_regex(key: &str, pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", key, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
