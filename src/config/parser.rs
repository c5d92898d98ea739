use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates a configuration file
///
/// Missing optional sections (`[downloader]`, `[analyzer]`, `[watchdog]`, `[output]`)
/// fall back to their defaults.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use docscan::config::load_config;
///
/// let config = load_config(Path::new("docscan.toml")).unwrap();
/// println!("Start URL: {}", config.crawler.start_url);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;

    tracing::debug!(
        "Loaded configuration from {} ({} filters)",
        path.display(),
        config.crawler.filters.len()
    );

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is logged at startup so that a report can be tied to the exact
/// configuration that produced it.
///
/// Returns the hex-encoded digest (64 characters).
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
