//! Pipeline driver
//!
//! Wires the components of a crawl run together:
//!
//! ```text
//! WebCrawler --found--> forwarder --download()--> Downloader --downloaded--> dispatcher --> ReportSink
//! ```
//!
//! Every stage stops when its input channel closes, so the shutdown cascades
//! from the crawler to the dispatcher. The [`WatchDog`] observes the crawler,
//! the downloader and the dispatcher and decides when the run is over; only
//! then are the task handles joined for their final reports.

use crate::analyzer::Multiplexer;
use crate::config::Config;
use crate::crawler::{build_http_client, CrawlerSettings, WebCrawler};
use crate::downloader::{DownloadedFile, Downloader, DownloaderHandle, DownloaderSettings};
use crate::output::{PipelineSummary, Report, ReportSink};
use crate::url::NormalizedUrl;
use crate::watchdog::{Liveness, LivenessGuard, WatchDog};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Result of handing one file to the [`Multiplexer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The analyzer produced a report
    Analyzed(Report),
    /// The format was not recognized; the file was skipped
    Unrecognized,
    /// Analysis failed; the report carries `status="error"` and the message
    Failed(Report),
}

/// Analyzes one file, turning failures into error reports
pub fn dispatch_file(multiplexer: &Multiplexer, path: &Path) -> Dispatched {
    match multiplexer.analyze_file(path) {
        Ok(Some(report)) => Dispatched::Analyzed(report),
        Ok(None) => Dispatched::Unrecognized,
        Err(e) => {
            tracing::warn!("Analysis of {} failed: {}", path.display(), e);
            Dispatched::Failed(
                Report::new("fileanalysis")
                    .with_attribute("filename", path.display())
                    .with_attribute("status", "error")
                    .with_attribute("message", e),
            )
        }
    }
}

/// Counters kept by the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DispatchCounts {
    analyzed: usize,
    unrecognized: usize,
    failures: usize,
}

/// Analyzes downloaded files one at a time until the downloader closes its channel
///
/// Runs on the blocking thread pool. `alive` is held until the last received
/// file has been analyzed, or until a panic unwinds out of the loop.
fn run_dispatcher(
    multiplexer: Multiplexer,
    mut downloaded: mpsc::UnboundedReceiver<DownloadedFile>,
    sink: Arc<dyn ReportSink>,
    alive: LivenessGuard,
) -> DispatchCounts {
    let mut counts = DispatchCounts::default();

    while let Some(file) = downloaded.blocking_recv() {
        tracing::debug!("Dispatching {} ({})", file.path.display(), file.url);

        let report = match dispatch_file(&multiplexer, &file.path) {
            Dispatched::Analyzed(report) => {
                counts.analyzed += 1;
                report
            }
            Dispatched::Unrecognized => {
                counts.unrecognized += 1;
                continue;
            }
            Dispatched::Failed(report) => {
                counts.failures += 1;
                report
            }
        };

        if let Err(e) = sink.emit(report.with_attribute("url", &file.url)) {
            tracing::error!("Failed to write report for {}: {}", file.url, e);
        }
    }

    drop(alive);
    tracing::info!(
        "Dispatcher finished: {} analyzed, {} unrecognized, {} failed",
        counts.analyzed,
        counts.unrecognized,
        counts.failures
    );
    counts
}

/// Passes every hit of the crawler to the downloader
///
/// Dropping the last downloader handle when the crawler's channel closes is
/// what lets the downloader wind down.
async fn forward_hits(
    mut found: mpsc::UnboundedReceiver<NormalizedUrl>,
    downloader: DownloaderHandle,
) -> usize {
    let mut forwarded = 0;
    while let Some(url) = found.recv().await {
        if let Err(e) = downloader.download(url) {
            tracing::error!("Downloader stopped accepting work: {}", e);
            break;
        }
        forwarded += 1;
    }
    forwarded
}

/// Runs a complete crawl: discover, download and analyze
///
/// Per-URL and per-file failures are counted in the summary; only setup
/// failures (invalid settings, HTTP client construction) are returned as errors.
pub async fn run_pipeline(config: &Config, sink: Arc<dyn ReportSink>) -> Result<PipelineSummary> {
    let started = Instant::now();

    let client = build_http_client(&config.user_agent)?;
    let settings = CrawlerSettings::from_config(&config.crawler)?;
    let downloader = Downloader::spawn(
        client.clone(),
        DownloaderSettings::from_config(&config.downloader),
    )?;
    let multiplexer = Multiplexer::from_config(&config.analyzer);

    let (found_tx, found_rx) = mpsc::unbounded_channel();
    let crawler = WebCrawler::new(client, settings, found_tx);

    let dispatcher_liveness = Liveness::new("dispatcher");
    let dispatcher_alive = dispatcher_liveness.enter();

    let mut watchdog = WatchDog::from_config(&config.watchdog);
    watchdog.add_watchable(Arc::new(crawler.liveness()));
    watchdog.add_watchable(Arc::new(downloader.liveness()));
    watchdog.add_watchable(Arc::new(dispatcher_liveness));

    let (handle, downloaded, download_task) = downloader.into_parts();
    let forward_task = tokio::spawn(forward_hits(found_rx, handle));
    let dispatch_task = tokio::task::spawn_blocking(move || {
        run_dispatcher(multiplexer, downloaded, sink, dispatcher_alive)
    });
    let crawl_task = crawler.start_search(config.crawler.expected_hits);

    watchdog.wait_all_dead().await;

    let crawl = crawl_task.await?;
    let forwarded = forward_task.await?;
    let download = download_task.await?;
    let counts = dispatch_task.await?;

    tracing::info!(
        "Pipeline finished in {:.1}s: {} pages fetched, {} hits forwarded, {} files analyzed",
        started.elapsed().as_secs_f64(),
        crawl.fetch_attempts(),
        forwarded,
        counts.analyzed
    );

    Ok(PipelineSummary {
        crawl,
        download,
        analyzed: counts.analyzed,
        unrecognized: counts.unrecognized,
        analysis_failures: counts.failures,
        duration: started.elapsed(),
    })
}
