use crate::{UrlError, UrlResult};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Canonical, comparable form of a URL
///
/// Two URLs that refer to the same resource after normalization compare equal.
/// This key is the only dedup criterion used by the crawler and the downloader.
#[derive(Debug, Clone)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Returns the underlying URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the canonical string key
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the key and returns the underlying URL
    pub fn into_url(self) -> Url {
        self.0
    }
}

impl PartialEq for NormalizedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for NormalizedUrl {}

impl Hash for NormalizedUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for NormalizedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedUrl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Normalizes a possibly-relative URL against an optional base URL
///
/// # Normalization Steps
///
/// 1. Resolve `partial` against `base` (or parse it as absolute); reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Lowercase scheme and host, drop the scheme's default port
/// 4. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
/// 6. Remove an empty query string (trailing ?)
///
/// Normalization is idempotent: normalizing an already normalized URL yields
/// the same key.
///
/// # Examples
///
/// ```
/// use docscan::url::normalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://Example.COM/docs/index.html").unwrap();
/// let url = normalize_url("../files/./report.pdf#page=2", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/files/report.pdf");
/// ```
pub fn normalize_url(partial: &str, base: Option<&Url>) -> UrlResult<NormalizedUrl> {
    let partial = partial.trim();

    let parsed = match base {
        Some(base) => base.join(partial),
        None => Url::parse(partial),
    };
    let mut url = parsed.map_err(|e| UrlError::Parse(format!("{}: {}", partial, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate already lowercases scheme and domain hosts; IP hosts are left alone
    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(NormalizedUrl(url))
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}
