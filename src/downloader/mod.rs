//! Download scheduler
//!
//! Turns URLs into files on disk with bounded concurrency. Each URL is
//! downloaded at most once; excess submissions wait in a FIFO backlog. Every
//! job carries its own timeout, which is the only way a transfer is cancelled.
//! Failures are counted, never retried.
//!
//! # Example
//!
//! ```no_run
//! use docscan::downloader::{Downloader, DownloaderSettings};
//! use docscan::normalize_url;
//!
//! # async fn example(client: reqwest::Client) -> docscan::Result<()> {
//! let settings = DownloaderSettings::new("/tmp/docscan/%{h:4}/%{h}_%{s}");
//! let downloader = Downloader::spawn(client, settings)?;
//! downloader.download(normalize_url("https://example.com/a.pdf", None)?)?;
//!
//! let (handle, mut downloaded, task) = downloader.into_parts();
//! drop(handle);
//! while let Some(file) = downloaded.recv().await {
//!     println!("{} -> {}", file.url, file.path.display());
//! }
//! let report = task.await?;
//! println!("{} succeeded, {} failed", report.successes, report.failures);
//! # Ok(())
//! # }
//! ```

mod job;
mod path_template;
mod scheduler;

pub use job::{DownloadReport, FetchJob, RunningJobSet, Submission};
pub use path_template::{detect_suffix, PathTemplate};

use crate::config::DownloaderConfig;
use crate::url::NormalizedUrl;
use crate::watchdog::Liveness;
use crate::{DocScanError, Result};
use reqwest::Client;
use scheduler::{Command, Scheduler};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Static downloader parameters
#[derive(Debug, Clone)]
pub struct DownloaderSettings {
    pub file_pattern: String,
    pub max_parallel_downloads: usize,
    pub timeout: Duration,
    pub max_file_bytes: u64,
}

impl DownloaderSettings {
    pub fn new(file_pattern: &str) -> Self {
        Self {
            file_pattern: file_pattern.to_string(),
            max_parallel_downloads: 8,
            timeout: Duration::from_secs(60),
            max_file_bytes: 256 * 1024 * 1024,
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self {
            file_pattern: config.file_pattern.clone(),
            max_parallel_downloads: config.max_parallel_downloads,
            timeout: Duration::from_secs(config.timeout_secs),
            max_file_bytes: config.max_file_bytes,
        }
    }
}

/// A payload written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub url: NormalizedUrl,
    pub path: PathBuf,
}

/// Cloneable submission side of a running downloader
#[derive(Debug, Clone)]
pub struct DownloaderHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl DownloaderHandle {
    /// Submits a URL; re-submitting a known URL is a no-op
    pub fn download(&self, url: NormalizedUrl) -> Result<()> {
        self.commands
            .send(Command::Download(url))
            .map_err(|_| DocScanError::ChannelClosed("downloader"))
    }

    /// Snapshot of the scheduler's counters
    pub async fn report(&self) -> Result<DownloadReport> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Report(reply))
            .map_err(|_| DocScanError::ChannelClosed("downloader"))?;
        response
            .await
            .map_err(|_| DocScanError::ChannelClosed("downloader report"))
    }
}

/// A running download scheduler
///
/// The scheduler stops once every [`DownloaderHandle`] is dropped and the
/// remaining jobs have drained; its task then resolves to the final report.
pub struct Downloader {
    handle: DownloaderHandle,
    downloaded: mpsc::UnboundedReceiver<DownloadedFile>,
    task: JoinHandle<DownloadReport>,
    liveness: Liveness,
}

impl Downloader {
    pub fn spawn(client: Client, settings: DownloaderSettings) -> Result<Self> {
        let template = PathTemplate::new(&settings.file_pattern)?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (downloaded_tx, downloaded_rx) = mpsc::unbounded_channel();

        let liveness = Liveness::new("downloader");

        let scheduler = Scheduler::new(
            client,
            template,
            settings.max_parallel_downloads,
            settings.timeout,
            settings.max_file_bytes,
            commands_rx,
            downloaded_tx,
            liveness.enter(),
        );
        let task = tokio::spawn(scheduler.run());

        Ok(Self {
            handle: DownloaderHandle {
                commands: commands_tx,
            },
            downloaded: downloaded_rx,
            task,
            liveness,
        })
    }

    pub fn handle(&self) -> DownloaderHandle {
        self.handle.clone()
    }

    pub fn download(&self, url: NormalizedUrl) -> Result<()> {
        self.handle.download(url)
    }

    /// Liveness flag for the [`WatchDog`](crate::WatchDog)
    ///
    /// Alive until the command channel is closed and all work has drained.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Splits into the submission handle, the stream of downloaded files and the
    /// task resolving to the final report
    pub fn into_parts(
        self,
    ) -> (
        DownloaderHandle,
        mpsc::UnboundedReceiver<DownloadedFile>,
        JoinHandle<DownloadReport>,
    ) {
        (self.handle, self.downloaded, self.task)
    }
}
