//! Job bookkeeping for the download scheduler
//!
//! [`RunningJobSet`] is owned by the scheduler task alone. Every check-then-mutate
//! sequence (dedup, admission, completion) is a single `&mut self` call, so it is
//! atomic with respect to all other events the scheduler handles.

use crate::url::NormalizedUrl;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// A download between admission and completion (or timeout)
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub key: NormalizedUrl,
    pub started: Instant,
    /// Duration of the timer owned by this job
    pub timeout: Duration,
}

impl FetchJob {
    fn new(key: NormalizedUrl, timeout: Duration) -> Self {
        Self {
            key,
            started: Instant::now(),
            timeout,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Aggregate counters of a download scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub successes: usize,
    pub failures: usize,
    /// Submissions ignored because the URL was already seen
    pub duplicates: usize,
    pub in_flight: usize,
    pub queued: usize,
}

impl DownloadReport {
    /// Number of finished downloads
    pub fn completed(&self) -> usize {
        self.successes + self.failures
    }
}

/// What happened to a submitted URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A job was created and must be started now
    Admitted,
    /// All slots are busy; the URL waits in the backlog
    Queued,
    /// The URL was seen before
    Duplicate,
}

/// In-flight jobs, FIFO backlog, seen set and counters
#[derive(Debug)]
pub struct RunningJobSet {
    running: HashMap<NormalizedUrl, FetchJob>,
    backlog: VecDeque<NormalizedUrl>,
    seen: HashSet<NormalizedUrl>,
    max_parallel: usize,
    timeout: Duration,
    successes: usize,
    failures: usize,
    duplicates: usize,
}

impl RunningJobSet {
    pub fn new(max_parallel: usize, timeout: Duration) -> Self {
        Self {
            running: HashMap::new(),
            backlog: VecDeque::new(),
            seen: HashSet::new(),
            max_parallel: max_parallel.max(1),
            timeout,
            successes: 0,
            failures: 0,
            duplicates: 0,
        }
    }

    /// Marks `key` as seen and admits it if a slot is free
    pub fn submit(&mut self, key: NormalizedUrl) -> Submission {
        if !self.seen.insert(key.clone()) {
            self.duplicates += 1;
            return Submission::Duplicate;
        }

        if self.running.len() < self.max_parallel {
            self.running
                .insert(key.clone(), FetchJob::new(key, self.timeout));
            Submission::Admitted
        } else {
            self.backlog.push_back(key);
            Submission::Queued
        }
    }

    /// Admits the oldest backlog entry if a slot is free
    pub fn admit_next(&mut self) -> Option<NormalizedUrl> {
        if self.running.len() >= self.max_parallel {
            return None;
        }

        let key = self.backlog.pop_front()?;
        self.running
            .insert(key.clone(), FetchJob::new(key.clone(), self.timeout));
        Some(key)
    }

    /// Removes a finished job and counts its outcome
    ///
    /// Returns `None` (and counts nothing) for a key that is not running.
    pub fn complete(&mut self, key: &NormalizedUrl, success: bool) -> Option<FetchJob> {
        let job = self.running.remove(key)?;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        Some(job)
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    pub fn queued(&self) -> usize {
        self.backlog.len()
    }

    /// No job running and nothing waiting
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.backlog.is_empty()
    }

    pub fn report(&self) -> DownloadReport {
        DownloadReport {
            successes: self.successes,
            failures: self.failures,
            duplicates: self.duplicates,
            in_flight: self.running.len(),
            queued: self.backlog.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::normalize_url;

    fn key(path: &str) -> NormalizedUrl {
        normalize_url(&format!("https://example.com/{}", path), None).unwrap()
    }

    fn jobs(max_parallel: usize) -> RunningJobSet {
        RunningJobSet::new(max_parallel, Duration::from_secs(1))
    }

    #[test]
    fn test_duplicate_submission_is_ignored() {
        let mut jobs = jobs(2);
        assert_eq!(jobs.submit(key("a.pdf")), Submission::Admitted);
        assert_eq!(jobs.submit(key("a.pdf")), Submission::Duplicate);
        assert_eq!(jobs.in_flight(), 1);

        // Also after completion: the URL stays seen
        jobs.complete(&key("a.pdf"), true);
        assert_eq!(jobs.submit(key("a.pdf")), Submission::Duplicate);
        assert_eq!(jobs.report().duplicates, 2);
    }

    #[test]
    fn test_admission_respects_limit_and_fifo() {
        let mut jobs = jobs(2);
        assert_eq!(jobs.submit(key("1")), Submission::Admitted);
        assert_eq!(jobs.submit(key("2")), Submission::Admitted);
        assert_eq!(jobs.submit(key("3")), Submission::Queued);
        assert_eq!(jobs.submit(key("4")), Submission::Queued);
        assert_eq!(jobs.in_flight(), 2);
        assert_eq!(jobs.admit_next(), None);

        jobs.complete(&key("2"), false);
        assert_eq!(jobs.admit_next(), Some(key("3")));
        assert_eq!(jobs.admit_next(), None);
        assert_eq!(jobs.in_flight(), 2);
        assert_eq!(jobs.queued(), 1);
    }

    #[test]
    fn test_job_completes_exactly_once() {
        let mut jobs = jobs(1);
        jobs.submit(key("x"));

        assert!(jobs.complete(&key("x"), true).is_some());
        assert!(jobs.complete(&key("x"), false).is_none());

        let report = jobs.report();
        assert_eq!(report.successes, 1);
        assert_eq!(report.failures, 0);
        assert!(jobs.is_idle());
    }
}
