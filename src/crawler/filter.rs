//! Content filters deciding which fetched resources count as hits

use crate::config::FilterEntry;
use crate::Result;
use regex::bytes::Regex;

/// A labelled pattern matched against the raw bytes of fetched resources
///
/// The hit count only ever grows.
#[derive(Debug, Clone)]
pub struct Filter {
    label: String,
    regex: Regex,
    target: Option<usize>,
    hits: usize,
}

impl Filter {
    /// Compiles a filter; `target` of `None` means unbounded
    pub fn new(label: impl Into<String>, pattern: &str, target: Option<usize>) -> Result<Self> {
        Ok(Self {
            label: label.into(),
            regex: Regex::new(pattern)?,
            target,
            hits: 0,
        })
    }

    pub fn from_entry(entry: &FilterEntry) -> Result<Self> {
        Self::new(entry.label.as_str(), &entry.pattern, entry.target_hits)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn matches(&self, content: &[u8]) -> bool {
        self.regex.is_match(content)
    }

    /// Counts one more hit
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// A bounded filter is satisfied once its target is reached; unbounded never are
    pub fn is_satisfied(&self) -> bool {
        self.target.map_or(false, |target| self.hits >= target)
    }

    /// Snapshot for reports
    pub fn summary(&self) -> FilterHits {
        FilterHits {
            label: self.label.clone(),
            hits: self.hits,
            target: self.target,
        }
    }
}

/// Hit count of one filter at the end of a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterHits {
    pub label: String,
    pub hits: usize,
    pub target: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_binary_content() {
        let filter = Filter::new("pdf", r"^%PDF-1\.[0-7]", None).unwrap();
        assert!(filter.matches(b"%PDF-1.4\n\xe2\xe3\xcf\xd3"));
        assert!(!filter.matches(b"<html>%PDF-1.4</html>"));
    }

    #[test]
    fn test_bounded_filter_satisfied_at_target() {
        let mut filter = Filter::new("report", "report", Some(2)).unwrap();
        assert!(!filter.is_satisfied());

        filter.record_hit();
        assert!(!filter.is_satisfied());
        filter.record_hit();
        assert!(filter.is_satisfied());

        // Counting continues past the target
        filter.record_hit();
        assert_eq!(filter.hits(), 3);
    }

    #[test]
    fn test_unbounded_filter_never_satisfied() {
        let mut filter = Filter::new("any", ".", None).unwrap();
        for _ in 0..100 {
            filter.record_hit();
        }
        assert!(!filter.is_satisfied());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Filter::new("broken", "(unclosed", None).is_err());
    }

    #[test]
    fn test_from_entry() {
        let entry = FilterEntry {
            label: "odt".to_string(),
            pattern: "opendocument".to_string(),
            target_hits: Some(5),
        };
        let filter = Filter::from_entry(&entry).unwrap();
        assert_eq!(filter.label(), "odt");
        assert_eq!(filter.target(), Some(5));
        assert_eq!(
            filter.summary(),
            FilterHits {
                label: "odt".to_string(),
                hits: 0,
                target: Some(5)
            }
        );
    }
}
