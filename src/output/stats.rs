//! Run statistics
//!
//! Collects the final reports of the crawler and the downloader together with
//! the dispatcher's counters and prints them once the pipeline has finished.

use crate::crawler::CrawlReport;
use crate::downloader::DownloadReport;
use std::time::Duration;

/// Final numbers of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub crawl: CrawlReport,
    pub download: DownloadReport,

    /// Files the analyzers produced a report for
    pub analyzed: usize,

    /// Files whose format was not recognized
    pub unrecognized: usize,

    /// Files whose analysis failed
    pub analysis_failures: usize,

    /// Wall-clock time from start to watchdog completion
    pub duration: Duration,
}

impl PipelineSummary {
    /// Files handed to the dispatcher
    pub fn dispatched(&self) -> usize {
        self.analyzed + self.unrecognized + self.analysis_failures
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(summary: &PipelineSummary) {
    println!("=== DocScan Statistics ===\n");

    let crawl = &summary.crawl;
    println!("Crawl:");
    println!("  Fetch attempts: {}", crawl.fetch_attempts());
    println!(
        "  Successful fetches: {} ({:.1}%)",
        crawl.successes,
        percentage(crawl.successes, crawl.fetch_attempts())
    );
    println!("  Failed fetches: {}", crawl.failures);
    println!("  External links seen: {}", crawl.discovered_external.len());
    println!("  Hits: {}", crawl.hits);
    println!();

    if !crawl.filter_hits.is_empty() {
        println!("Filters:");
        for filter in &crawl.filter_hits {
            match filter.target {
                Some(target) => println!("  {}: {} / {}", filter.label, filter.hits, target),
                None => println!("  {}: {}", filter.label, filter.hits),
            }
        }
        println!();
    }

    let download = &summary.download;
    println!("Downloads:");
    println!("  Completed: {}", download.completed());
    println!("  Succeeded: {}", download.successes);
    println!("  Failed: {}", download.failures);
    println!("  Duplicates ignored: {}", download.duplicates);
    println!();

    println!("Analysis:");
    println!("  Analyzed: {}", summary.analyzed);
    println!("  Unrecognized: {}", summary.unrecognized);
    println!("  Failed: {}", summary.analysis_failures);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} files analyzed) in {:.1}s",
        percentage(summary.analyzed, summary.dispatched()),
        summary.analyzed,
        summary.dispatched(),
        summary.duration.as_secs_f64()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_summary_counts() {
        let summary = PipelineSummary {
            analyzed: 7,
            unrecognized: 2,
            analysis_failures: 1,
            ..PipelineSummary::default()
        };

        assert_eq!(summary.dispatched(), 10);
        assert_eq!(summary.download.completed(), 0);
    }

    #[test]
    fn test_percentage_of_nothing() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }
}
