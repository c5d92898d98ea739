//! Destination paths for downloaded files
//!
//! A file pattern such as `/tmp/docscan/%{h:4}/%{h}_%{s}` is expanded per
//! payload. Supported tokens:
//!
//! | Token | Replacement |
//! |-------|-------------|
//! | `%{h}` | SHA-256 of the payload, hex |
//! | `%{h:N}` | first N hex characters of the hash |
//! | `%{d}` | host the file was downloaded from |
//! | `%{s}` | detected file suffix, without dot |

use crate::analyzer::{is_zip_content, suffix_for_content};
use crate::crawler::FetchedResource;
use crate::url::{extension_for_mimetype, file_extension};
use crate::Result;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use url::Url;

/// Compiled file pattern
#[derive(Debug, Clone)]
pub struct PathTemplate {
    pattern: String,
    tokens: Regex,
}

impl PathTemplate {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            tokens: Regex::new(r"%\{(?:h(?::(\d+))?|d|s)\}")?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Expands the pattern; unknown `%{...}` sequences are kept literally
    pub fn render(&self, hash: &str, host: &str, suffix: &str) -> PathBuf {
        let rendered = self.tokens.replace_all(&self.pattern, |caps: &Captures| {
            let token = &caps[0];
            if token == "%{d}" {
                host.to_string()
            } else if token == "%{s}" {
                suffix.to_string()
            } else {
                match caps.get(1).and_then(|n| n.as_str().parse::<usize>().ok()) {
                    Some(length) => hash[..length.min(hash.len())].to_string(),
                    None => hash.to_string(),
                }
            }
        });

        PathBuf::from(rendered.into_owned())
    }

    /// Writes a payload to its rendered path, creating directories on demand
    pub async fn store(&self, url: &Url, resource: &FetchedResource) -> Result<PathBuf> {
        let hash = hex::encode(Sha256::digest(&resource.body));
        let host = url.host_str().unwrap_or("unknown-host");
        let suffix = detect_suffix(&resource.body, resource.content_type.as_deref(), url);

        let path = self.render(&hash, host, &suffix);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &resource.body).await?;

        tracing::debug!("Stored {} ({} bytes) as {}", url, resource.body.len(), path.display());
        Ok(path)
    }
}

/// Picks a file suffix: content signature, Content-Type, URL extension, then `data`
pub fn detect_suffix(body: &[u8], content_type: Option<&str>, url: &Url) -> String {
    if let Some(suffix) = suffix_for_content(body) {
        return suffix.to_string();
    }

    if let Some(content_type) = content_type {
        let suffix = extension_for_mimetype(content_type);
        if suffix != "data" {
            return suffix.to_string();
        }
    }

    if let Some(extension) = file_extension(url.path()) {
        return extension;
    }

    if is_zip_content(body) {
        "zip".to_string()
    } else {
        "data".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_render_all_tokens() {
        let template = PathTemplate::new("/tmp/dl/%{d}/%{h:4}/%{h}_%{s}").unwrap();
        assert_eq!(
            template.render(HASH, "example.com", "pdf"),
            PathBuf::from(format!("/tmp/dl/example.com/0123/{}_pdf", HASH))
        );
    }

    #[test]
    fn test_render_clamps_prefix_length() {
        let template = PathTemplate::new("%{h:100}.%{s}").unwrap();
        assert_eq!(
            template.render("abc", "h", "zip"),
            PathBuf::from("abc.zip")
        );
    }

    #[test]
    fn test_render_keeps_unknown_tokens() {
        let template = PathTemplate::new("/x/%{q}/%{h:2}").unwrap();
        assert_eq!(template.render(HASH, "h", "s"), PathBuf::from("/x/%{q}/01"));
    }

    #[test]
    fn test_detect_suffix_order() {
        // Signature beats everything
        assert_eq!(
            detect_suffix(b"%PDF-1.5", Some("text/html"), &url("https://e.com/a.doc")),
            "pdf"
        );
        // Content-Type next
        assert_eq!(
            detect_suffix(
                b"PK\x03\x04",
                Some("application/vnd.oasis.opendocument.text"),
                &url("https://e.com/get?id=1")
            ),
            "odt"
        );
        // URL extension next
        assert_eq!(
            detect_suffix(b"PK\x03\x04", None, &url("https://e.com/files/report.DOCX")),
            "docx"
        );
        // Generic ZIP, then data
        assert_eq!(detect_suffix(b"PK\x03\x04", None, &url("https://e.com/get")), "zip");
        assert_eq!(detect_suffix(b"???", None, &url("https://e.com/get")), "data");
    }

    #[tokio::test]
    async fn test_store_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/%{{d}}/%{{h:2}}/%{{h}}.%{{s}}", dir.path().display());
        let template = PathTemplate::new(&pattern).unwrap();

        let resource = FetchedResource {
            final_url: url("https://example.com/a.pdf"),
            status_code: 200,
            content_type: Some("application/pdf".to_string()),
            body: b"%PDF-1.4 test".to_vec(),
        };

        let path = template.store(&resource.final_url, &resource).await.unwrap();
        assert!(path.starts_with(dir.path().join("example.com")));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 test");
    }
}
