//! HTML parser for extracting links and metadata
//!
//! Extracts the links a crawled page points to (anchors, frames, canonical
//! links) and its title for log messages.

use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` and `<area href="...">`, including `download` links
/// - `<frame src="...">` and `<iframe src="...">`
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<link rel="stylesheet" ...>`
/// - `<script src="...">`
/// - `<img src="...">`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// Duplicates are kept; the crawler deduplicates after normalization.
///
/// # Example
///
/// ```
/// use docscan::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let links = extract_links(&document, base_url);

    ParsedPage { title, links }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Selector and the attribute holding the link target
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("frame[src]", "src"),
    ("iframe[src]", "src"),
    ("link[rel='canonical'][href]", "href"),
];

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for (selector, attribute) in LINK_SOURCES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        for element in document.select(&selector) {
            if let Some(target) = element.value().attr(attribute) {
                if let Some(absolute_url) = resolve_link(target, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Schemes that never lead to a fetchable document
const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Resolves a link target to an absolute http(s) URL
///
/// Returns None for empty and fragment-only targets, ignored schemes and
/// anything that does not resolve to http or https.
fn resolve_link(target: &str, base_url: &Url) -> Option<String> {
    let target = target.trim();
    if target.is_empty() || target.starts_with('#') {
        return None;
    }

    let lowercase = target.to_ascii_lowercase();
    if IGNORED_SCHEMES.iter().any(|scheme| lowercase.starts_with(scheme)) {
        return None;
    }

    let absolute_url = base_url.join(target).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then(|| absolute_url.to_string())
}
