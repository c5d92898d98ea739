/// Page state definitions for tracking crawl progress
///
/// This module defines all states a page moves through inside the crawler.
use crate::DocScanError;
use std::fmt;

/// Represents the current state of a page in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Page is in the frontier and waiting for a fetch slot
    Queued,

    /// Page is currently being fetched
    Fetching,

    // ===== Terminal States =====
    /// Page was fetched, matched against filters and its links were extracted
    LinksExtracted,

    /// Page fetch failed or timed out
    Errored,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LinksExtracted | Self::Errored)
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the state may move to `next`
    pub fn can_transition_to(&self, next: PageState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Fetching)
                | (Self::Fetching, Self::LinksExtracted)
                | (Self::Fetching, Self::Errored)
        )
    }

    /// Performs a checked state transition
    pub fn transition(self, next: PageState) -> Result<PageState, DocScanError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DocScanError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Short lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::LinksExtracted => "links_extracted",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
