//! DocScan main entry point
//!
//! Analyzes a single document, or runs a crawl described by a TOML file.

use clap::Parser;
use docscan::config::{load_config_with_hash, Config};
use docscan::output::{print_statistics, xml_node_to_text, ReportSink, XmlReportSink};
use docscan::pipeline::{dispatch_file, run_pipeline, Dispatched};
use docscan::Multiplexer;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// DocScan: document discovery and provenance analysis
///
/// Without options, analyzes FILE and prints an XML report. With --crawl,
/// FILE is a configuration describing a crawl whose hits are downloaded and
/// analyzed.
#[derive(Parser, Debug)]
#[command(name = "docscan")]
#[command(version)]
#[command(about = "Document discovery and provenance analysis", long_about = None)]
struct Cli {
    /// Document to analyze, or TOML configuration with --crawl
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Treat FILE as a crawl configuration
    #[arg(long)]
    crawl: bool,

    /// Recurse into files embedded in containers (single-file mode)
    #[arg(long, conflicts_with = "crawl")]
    embedded: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version requests are not errors
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    setup_logging(cli.verbose, cli.quiet);

    if cli.crawl {
        handle_crawl(&cli.file).await
    } else {
        handle_single_file(&cli.file, cli.embedded)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries the XML report.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docscan=info,warn"),
            1 => EnvFilter::new("docscan=debug,info"),
            2 => EnvFilter::new("docscan=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Analyzes one file and prints its report
///
/// Unrecognized and unanalyzable files are reported, never fatal.
fn handle_single_file(path: &Path, embedded: bool) -> ExitCode {
    let mut multiplexer = Multiplexer::new();
    multiplexer.set_analyze_embedded_files(embedded);

    let report = match dispatch_file(&multiplexer, path) {
        Dispatched::Analyzed(report) | Dispatched::Failed(report) => report,
        Dispatched::Unrecognized => {
            tracing::warn!("{}: unknown file format", path.display());
            return ExitCode::SUCCESS;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout
        .write_all(xml_node_to_text(&report).as_bytes())
        .and_then(|()| stdout.flush())
    {
        tracing::error!("Failed to write report: {}", e);
    }

    ExitCode::SUCCESS
}

/// Runs the crawl pipeline described by a configuration file
async fn handle_crawl(config_path: &Path) -> ExitCode {
    tracing::info!("Loading configuration from: {}", config_path.display());
    let config = match load_config_with_hash(config_path) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::from(1);
        }
    };

    let sink = match report_sink(&config) {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!("Failed to open report file: {}", e);
            return ExitCode::from(1);
        }
    };

    match run_pipeline(&config, sink).await {
        Ok(summary) => {
            // With the report on stdout the statistics would corrupt it
            if config.output.report_path.is_some() {
                print_statistics(&summary);
            } else {
                tracing::info!(
                    "{} files analyzed, {} unrecognized, {} failed",
                    summary.analyzed,
                    summary.unrecognized,
                    summary.analysis_failures
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            ExitCode::from(1)
        }
    }
}

fn report_sink(config: &Config) -> io::Result<Arc<dyn ReportSink>> {
    Ok(match &config.output.report_path {
        Some(path) => {
            tracing::info!("Writing reports to {}", path);
            Arc::new(XmlReportSink::new(BufWriter::new(File::create(path)?)))
        }
        None => Arc::new(XmlReportSink::new(io::stdout())),
    })
}
