use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docscan::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `candidate` lies on the same origin as `base` and below its path
///
/// Scheme, host and effective port must match exactly. The candidate's path must
/// equal the base path or continue it at a segment boundary, so a base of
/// `/docs` admits `/docs/a.pdf` but not `/docs-old/a.pdf`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docscan::url::is_sub_address;
///
/// let base = Url::parse("https://example.com/docs").unwrap();
/// assert!(is_sub_address(&Url::parse("https://example.com/docs/a.pdf").unwrap(), &base));
/// assert!(!is_sub_address(&Url::parse("https://other.com/docs/a.pdf").unwrap(), &base));
/// ```
pub fn is_sub_address(candidate: &Url, base: &Url) -> bool {
    if candidate.scheme() != base.scheme()
        || extract_domain(candidate) != extract_domain(base)
        || candidate.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    let base_path = base.path().trim_end_matches('/');
    if base_path.is_empty() {
        return true;
    }

    let path = candidate.path();
    path == base_path
        || path
            .strip_prefix(base_path)
            .map_or(false, |rest| rest.starts_with('/'))
}

/// Derives the default crawl boundary from a start URL: its parent directory
pub fn parent_address(url: &Url) -> Url {
    url.join(".").unwrap_or_else(|_| url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_simple_domain() {
        assert_eq!(
            extract_domain(&url("https://example.com/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_with_port() {
        assert_eq!(
            extract_domain(&url("https://example.com:8080/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_sub_address_same_origin_root() {
        let base = url("https://example.com/");
        assert!(is_sub_address(&url("https://example.com/a/b.pdf"), &base));
        assert!(is_sub_address(&url("https://example.com/"), &base));
    }

    #[test]
    fn test_sub_address_rejects_other_host() {
        let base = url("https://example.com/");
        assert!(!is_sub_address(&url("https://other.com/"), &base));
        assert!(!is_sub_address(&url("https://sub.example.com/"), &base));
    }

    #[test]
    fn test_sub_address_rejects_other_scheme_or_port() {
        let base = url("https://example.com/");
        assert!(!is_sub_address(&url("http://example.com/"), &base));
        assert!(!is_sub_address(&url("https://example.com:8443/"), &base));
        assert!(is_sub_address(&url("https://example.com:443/x"), &base));
    }

    #[test]
    fn test_sub_address_path_boundary() {
        let base = url("https://example.com/docs");
        assert!(is_sub_address(&url("https://example.com/docs"), &base));
        assert!(is_sub_address(&url("https://example.com/docs/2020/a.pdf"), &base));
        assert!(!is_sub_address(&url("https://example.com/docs-old/a.pdf"), &base));
        assert!(!is_sub_address(&url("https://example.com/"), &base));
    }

    #[test]
    fn test_parent_address() {
        assert_eq!(
            parent_address(&url("https://example.com/docs/index.html")).as_str(),
            "https://example.com/docs/"
        );
        assert_eq!(
            parent_address(&url("https://example.com/")).as_str(),
            "https://example.com/"
        );
    }
}
