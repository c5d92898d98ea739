//! The download scheduler task
//!
//! One task owns the [`RunningJobSet`]. Submissions arrive as commands over a
//! channel, transfers run in a `JoinSet`, and completions (including timeouts)
//! are handled by the same task, one event at a time. Each transfer task's id
//! maps back to its URL, so even a task that panicked releases its slot.

use crate::crawler::{fetch_url_with_timeout, FetchResult};
use crate::downloader::job::{DownloadReport, RunningJobSet, Submission};
use crate::downloader::path_template::PathTemplate;
use crate::downloader::DownloadedFile;
use crate::url::NormalizedUrl;
use crate::watchdog::LivenessGuard;
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{Id, JoinError, JoinSet};

/// Messages accepted by the scheduler task
#[derive(Debug)]
pub(crate) enum Command {
    Download(NormalizedUrl),
    Report(oneshot::Sender<DownloadReport>),
}

/// How a single job ended
#[derive(Debug)]
enum JobOutcome {
    Stored(PathBuf),
    Failed(String),
    TimedOut,
}

pub(crate) struct Scheduler {
    client: Client,
    template: Arc<PathTemplate>,
    timeout: Duration,
    max_file_bytes: u64,
    commands: mpsc::UnboundedReceiver<Command>,
    downloaded: mpsc::UnboundedSender<DownloadedFile>,
    jobs: RunningJobSet,
    transfers: JoinSet<JobOutcome>,
    transfer_urls: HashMap<Id, NormalizedUrl>,
    // Cleared when the scheduler is dropped, panics included
    _alive: LivenessGuard,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: Client,
        template: PathTemplate,
        max_parallel_downloads: usize,
        timeout: Duration,
        max_file_bytes: u64,
        commands: mpsc::UnboundedReceiver<Command>,
        downloaded: mpsc::UnboundedSender<DownloadedFile>,
        alive: LivenessGuard,
    ) -> Self {
        Self {
            client,
            template: Arc::new(template),
            timeout,
            max_file_bytes,
            commands,
            downloaded,
            jobs: RunningJobSet::new(max_parallel_downloads, timeout),
            transfers: JoinSet::new(),
            transfer_urls: HashMap::new(),
            _alive: alive,
        }
    }

    /// Runs until the command channel is closed and all work has drained
    pub(crate) async fn run(mut self) -> DownloadReport {
        let mut accepting = true;

        loop {
            if !accepting && self.jobs.is_idle() && self.transfers.is_empty() {
                break;
            }

            tokio::select! {
                command = self.commands.recv(), if accepting => match command {
                    Some(Command::Download(url)) => self.download(url),
                    Some(Command::Report(reply)) => {
                        let _ = reply.send(self.jobs.report());
                    }
                    None => {
                        tracing::debug!("Download queue closed, draining {} jobs", self.jobs.in_flight());
                        accepting = false;
                    }
                },
                Some(joined) = self.transfers.join_next_with_id(), if !self.transfers.is_empty() => {
                    self.finished(joined);
                }
                else => break,
            }
        }

        let report = self.jobs.report();
        tracing::info!(
            "Downloads finished: {} succeeded, {} failed, {} duplicates skipped",
            report.successes,
            report.failures,
            report.duplicates
        );

        report
    }

    fn download(&mut self, url: NormalizedUrl) {
        match self.jobs.submit(url.clone()) {
            Submission::Admitted => self.start(url),
            Submission::Queued => {
                tracing::trace!("All slots busy, queued {} ({} waiting)", url, self.jobs.queued());
            }
            Submission::Duplicate => tracing::debug!("Already downloaded or running: {}", url),
        }
    }

    fn start(&mut self, url: NormalizedUrl) {
        tracing::debug!("Downloading {} ({} in flight)", url, self.jobs.in_flight());

        let client = self.client.clone();
        let template = Arc::clone(&self.template);
        let timeout = self.timeout;
        let max_body = self.max_file_bytes;
        let target = url.clone();

        self.track(url, async move {
            match fetch_url_with_timeout(&client, target.as_url(), timeout, max_body).await {
                FetchResult::Success(resource) => {
                    match template.store(target.as_url(), &resource).await {
                        Ok(path) => JobOutcome::Stored(path),
                        Err(e) => JobOutcome::Failed(format!("cannot store payload: {}", e)),
                    }
                }
                FetchResult::HttpError { status_code } => {
                    JobOutcome::Failed(format!("HTTP {}", status_code))
                }
                FetchResult::NetworkError { error } => JobOutcome::Failed(error),
                FetchResult::Timeout => JobOutcome::TimedOut,
                FetchResult::TooLarge { limit } => {
                    JobOutcome::Failed(format!("larger than {} bytes", limit))
                }
            }
        });
    }

    /// Spawns the transfer for `url` and remembers which task carries it
    fn track<F>(&mut self, url: NormalizedUrl, transfer: F)
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        let task = self.transfers.spawn(transfer);
        self.transfer_urls.insert(task.id(), url);
    }

    fn finished(&mut self, joined: Result<(Id, JobOutcome), JoinError>) {
        let (id, outcome) = match joined {
            Ok(result) => result,
            Err(e) => {
                let id = e.id();
                (id, JobOutcome::Failed(format!("download task failed: {}", e)))
            }
        };

        let Some(url) = self.transfer_urls.remove(&id) else {
            tracing::warn!("Completion for unknown transfer task {}", id);
            return;
        };

        let success = matches!(outcome, JobOutcome::Stored(_));
        let Some(job) = self.jobs.complete(&url, success) else {
            tracing::warn!("Completion for unknown job {}", url);
            return;
        };

        match outcome {
            JobOutcome::Stored(path) => {
                tracing::info!("Downloaded {} in {:?}", url, job.elapsed());
                if self
                    .downloaded
                    .send(DownloadedFile { url, path })
                    .is_err()
                {
                    tracing::debug!("Nobody consumes downloaded files anymore");
                }
            }
            JobOutcome::Failed(reason) => tracing::warn!("Download of {} failed: {}", url, reason),
            JobOutcome::TimedOut => {
                tracing::warn!("Download of {} timed out after {:?}", url, job.timeout)
            }
        }

        while let Some(next) = self.jobs.admit_next() {
            self.start(next);
        }
    }
}
