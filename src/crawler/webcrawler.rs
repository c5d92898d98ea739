//! Web crawler - bounded-concurrency URL frontier
//!
//! The crawl runs as a single task that exclusively owns the frontier, the set of
//! known URLs, the filters and all counters. Fetches run concurrently in a
//! `JoinSet`, each under its own timer; their completions are handled one at a
//! time by the owning task, so no state is shared between fetches.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{fetch_url_with_timeout, FetchResult, FetchedResource};
use crate::crawler::filter::{Filter, FilterHits};
use crate::crawler::parser::parse_html;
use crate::state::PageState;
use crate::url::{is_sub_address, normalize_url, parent_address, NormalizedUrl};
use crate::watchdog::Liveness;
use crate::Result;
use regex::bytes::Regex;
use reqwest::Client;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use url::Url;

/// Static crawl parameters
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    /// First page to fetch
    pub start_url: NormalizedUrl,

    /// Only URLs below this address are fetched
    pub base_url: Url,

    /// Content every hit must contain in addition to a filter match
    pub required_content: Option<Regex>,

    pub filters: Vec<Filter>,

    /// Maximum number of fetch attempts
    pub max_visited_pages: usize,

    /// Maximum number of concurrent fetches
    pub max_parallel_downloads: usize,

    /// Timer attached to every fetch
    pub fetch_timeout: Duration,

    /// Pages with a larger body count as failed fetches
    pub max_page_bytes: u64,
}

impl CrawlerSettings {
    /// Settings with default limits, crawling below the start URL's directory
    pub fn new(start_url: NormalizedUrl) -> Self {
        let base_url = parent_address(start_url.as_url());
        Self {
            start_url,
            base_url,
            required_content: None,
            filters: Vec::new(),
            max_visited_pages: 1024,
            max_parallel_downloads: 8,
            fetch_timeout: Duration::from_secs(30),
            max_page_bytes: 16 * 1024 * 1024,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        let start_url = normalize_url(&config.start_url, None)?;

        let base_url = match &config.base_url {
            Some(base) => normalize_url(base, None)?.into_url(),
            None => parent_address(start_url.as_url()),
        };

        let required_content = config
            .required_content
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        let filters = config
            .filters
            .iter()
            .map(Filter::from_entry)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            start_url,
            base_url,
            required_content,
            filters,
            max_visited_pages: config.max_visited_pages,
            max_parallel_downloads: config.max_parallel_downloads,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_page_bytes: config.max_page_bytes,
        })
    }
}

/// Outcome of one crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Every URL a fetch was issued for
    pub visited: BTreeSet<NormalizedUrl>,

    /// Links outside the crawl boundary; recorded, never fetched
    pub discovered_external: BTreeSet<NormalizedUrl>,

    /// Final hit count per filter
    pub filter_hits: Vec<FilterHits>,

    /// Number of URLs emitted as hits
    pub hits: usize,

    /// Fetches that returned content
    pub successes: usize,

    /// Fetches that failed or timed out
    pub failures: usize,
}

impl CrawlReport {
    pub fn fetch_attempts(&self) -> usize {
        self.visited.len()
    }
}

/// Crawls a site and emits the URLs of pages matching its filters
pub struct WebCrawler {
    client: Client,
    settings: CrawlerSettings,
    found: mpsc::UnboundedSender<NormalizedUrl>,
    liveness: Liveness,
}

impl WebCrawler {
    pub fn new(
        client: Client,
        settings: CrawlerSettings,
        found: mpsc::UnboundedSender<NormalizedUrl>,
    ) -> Self {
        Self {
            client,
            settings,
            found,
            liveness: Liveness::new("crawler"),
        }
    }

    /// Liveness flag for the [`WatchDog`](crate::WatchDog)
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Starts crawling at the start URL
    ///
    /// Admission stops after `num_expected_hits` hits (if given), once every
    /// filter reached its target or when the page budget is used up. Fetches
    /// already in flight are allowed to finish. The returned handle resolves to
    /// the crawl report.
    pub fn start_search(self, num_expected_hits: Option<usize>) -> JoinHandle<CrawlReport> {
        // Up before the spawn so the watchdog can never miss the start
        let alive = self.liveness.enter();

        let run = CrawlRun::new(self, num_expected_hits);
        tokio::spawn(async move {
            let _alive = alive;
            run.crawl().await
        })
    }
}

/// State owned by the crawl task
struct CrawlRun {
    client: Client,
    settings: CrawlerSettings,
    found: mpsc::UnboundedSender<NormalizedUrl>,
    num_expected_hits: Option<usize>,
    frontier: VecDeque<NormalizedUrl>,
    pages: HashMap<NormalizedUrl, PageState>,
    report: CrawlReport,
}

impl CrawlRun {
    fn new(crawler: WebCrawler, num_expected_hits: Option<usize>) -> Self {
        Self {
            client: crawler.client,
            settings: crawler.settings,
            found: crawler.found,
            num_expected_hits,
            frontier: VecDeque::new(),
            pages: HashMap::new(),
            report: CrawlReport::default(),
        }
    }

    async fn crawl(mut self) -> CrawlReport {
        tracing::info!(
            "Starting crawl at {} (boundary {}, budget {} pages)",
            self.settings.start_url,
            self.settings.base_url,
            self.settings.max_visited_pages
        );

        let start_url = self.settings.start_url.clone();
        self.enqueue(start_url);

        let mut in_flight = JoinSet::new();

        loop {
            // Work-conserving admission: refill every free slot right away
            while in_flight.len() < self.settings.max_parallel_downloads && self.may_admit() {
                let Some(url) = self.frontier.pop_front() else {
                    break;
                };

                self.set_state(&url, PageState::Fetching);
                self.report.visited.insert(url.clone());
                tracing::debug!(
                    "Fetching {} ({}/{})",
                    url,
                    self.report.visited.len(),
                    self.settings.max_visited_pages
                );

                let client = self.client.clone();
                let timeout = self.settings.fetch_timeout;
                let max_body = self.settings.max_page_bytes;
                in_flight.spawn(async move {
                    let result =
                        fetch_url_with_timeout(&client, url.as_url(), timeout, max_body).await;
                    (url, result)
                });
            }

            match in_flight.join_next().await {
                Some(Ok((url, result))) => self.handle_result(url, result),
                Some(Err(e)) => {
                    tracing::warn!("Fetch task failed: {}", e);
                    self.report.failures += 1;
                }
                None => break,
            }
        }

        self.report.filter_hits = self.settings.filters.iter().map(Filter::summary).collect();

        tracing::info!(
            "Crawl finished: {} pages visited, {} hits, {} failures, {} external links skipped",
            self.report.visited.len(),
            self.report.hits,
            self.report.failures,
            self.report.discovered_external.len()
        );

        self.report
    }

    /// Returns true if another fetch may be issued
    fn may_admit(&self) -> bool {
        if self.report.visited.len() >= self.settings.max_visited_pages {
            return false;
        }

        if let Some(expected) = self.num_expected_hits {
            if self.report.hits >= expected {
                return false;
            }
        }

        let filters = &self.settings.filters;
        filters.is_empty() || !filters.iter().all(Filter::is_satisfied)
    }

    /// Adds an unseen in-boundary URL to the frontier
    fn enqueue(&mut self, url: NormalizedUrl) {
        if self.pages.contains_key(&url) {
            return;
        }

        if !is_sub_address(url.as_url(), &self.settings.base_url) {
            if self.report.discovered_external.insert(url.clone()) {
                tracing::trace!("Skipping off-origin link {}", url);
            }
            return;
        }

        // Pages beyond the budget could never be fetched anyway
        if self.pages.len() >= self.settings.max_visited_pages {
            return;
        }

        self.pages.insert(url.clone(), PageState::Queued);
        self.frontier.push_back(url);
    }

    fn set_state(&mut self, url: &NormalizedUrl, next: PageState) {
        if let Some(state) = self.pages.get_mut(url) {
            match state.transition(next) {
                Ok(new_state) => *state = new_state,
                Err(e) => tracing::warn!("{}: {}", url, e),
            }
        }
    }

    fn handle_result(&mut self, url: NormalizedUrl, result: FetchResult) {
        match result {
            FetchResult::Success(resource) => {
                self.report.successes += 1;
                self.check_filters(&url, &resource);
                self.extract_links(&url, &resource);
                self.set_state(&url, PageState::LinksExtracted);
            }
            FetchResult::HttpError { status_code } => {
                tracing::warn!("HTTP {} for {}", status_code, url);
                self.record_failure(&url);
            }
            FetchResult::NetworkError { error } => {
                tracing::warn!("Failed to fetch {}: {}", url, error);
                self.record_failure(&url);
            }
            FetchResult::Timeout => {
                tracing::warn!(
                    "Fetch of {} timed out after {:?}",
                    url,
                    self.settings.fetch_timeout
                );
                self.record_failure(&url);
            }
            FetchResult::TooLarge { limit } => {
                tracing::warn!("Skipping {}: body exceeds {} bytes", url, limit);
                self.record_failure(&url);
            }
        }
    }

    fn record_failure(&mut self, url: &NormalizedUrl) {
        self.report.failures += 1;
        self.set_state(url, PageState::Errored);
    }

    /// Counts filter matches and emits the URL once if any filter matched
    fn check_filters(&mut self, url: &NormalizedUrl, resource: &FetchedResource) {
        if let Some(required) = &self.settings.required_content {
            if !required.is_match(&resource.body) {
                return;
            }
        }

        let mut matched = false;
        for filter in self.settings.filters.iter_mut() {
            if filter.matches(&resource.body) {
                filter.record_hit();
                matched = true;
                tracing::debug!(
                    "{} matches filter '{}' (hit {})",
                    url,
                    filter.label(),
                    filter.hits()
                );
            }
        }

        if matched {
            self.report.hits += 1;
            if self.found.send(url.clone()).is_err() {
                tracing::debug!("Nobody listens for hits anymore, dropping {}", url);
            }
        }
    }

    fn extract_links(&mut self, url: &NormalizedUrl, resource: &FetchedResource) {
        if !resource.is_html() {
            return;
        }

        let html = String::from_utf8_lossy(&resource.body);
        let page = parse_html(&html, &resource.final_url);
        tracing::trace!(
            "{} ({}) links to {} URLs",
            url,
            page.title.as_deref().unwrap_or("untitled"),
            page.links.len()
        );

        for link in page.links {
            match normalize_url(&link, None) {
                Ok(normalized) => self.enqueue(normalized),
                Err(e) => tracing::debug!("Failed to normalize URL {}: {}", link, e),
            }
        }
    }
}
