//! State module for tracking crawl progress
//!
//! `PageState` tracks the lifecycle of each page the crawler fetches:
//! `Queued → Fetching → {LinksExtracted | Errored}`.

mod page_state;

pub use page_state::PageState;
