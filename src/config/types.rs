use serde::Deserialize;

/// Main configuration structure for DocScan
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// First page to fetch
    pub start_url: String,

    /// Crawl boundary; defaults to the start URL's parent directory
    #[serde(default)]
    pub base_url: Option<String>,

    /// Regex a page must contain before any filter may count it as a hit
    #[serde(default)]
    pub required_content: Option<String>,

    /// Maximum number of fetch attempts issued during one crawl
    #[serde(default = "default_max_visited_pages")]
    pub max_visited_pages: usize,

    /// Maximum number of concurrent page fetches
    #[serde(default = "default_max_parallel_downloads")]
    pub max_parallel_downloads: usize,

    /// Per-fetch timeout (seconds)
    #[serde(default = "default_crawler_timeout")]
    pub fetch_timeout_secs: u64,

    /// Largest page body read into memory (bytes)
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: u64,

    /// Stop admitting pages once this many hits were found
    #[serde(default)]
    pub expected_hits: Option<usize>,

    /// Content filters
    #[serde(default)]
    pub filters: Vec<FilterEntry>,
}

/// Content filter entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FilterEntry {
    /// Name used in reports
    pub label: String,

    /// Regular expression matched against fetched content
    pub pattern: String,

    /// Number of hits after which the filter is satisfied; unbounded if absent
    #[serde(default)]
    pub target_hits: Option<usize>,
}

/// Download scheduler configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DownloaderConfig {
    /// Destination path template (`%{h}`, `%{h:N}`, `%{d}`, `%{s}`)
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Maximum number of concurrent downloads
    #[serde(default = "default_max_parallel_downloads")]
    pub max_parallel_downloads: usize,

    /// Per-download timeout (seconds)
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Largest file downloaded (bytes)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            file_pattern: default_file_pattern(),
            max_parallel_downloads: default_max_parallel_downloads(),
            timeout_secs: default_download_timeout(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Text extraction mode forwarded to every analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextExtraction {
    /// No text is extracted
    #[default]
    None,
    /// Only the length of the extracted text is reported
    Length,
    /// Full text is included in the report body
    Full,
}

/// Analyzer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalyzerConfig {
    /// Recurse into files embedded in container formats
    #[serde(default)]
    pub embedded_files: bool,

    #[serde(default)]
    pub text_extraction: TextExtraction,

    /// Maximum nesting of embedded files
    #[serde(default = "default_max_embedded_depth")]
    pub max_embedded_depth: usize,

    /// Maximum number of entries analyzed per container
    #[serde(default = "default_max_embedded_entries")]
    pub max_embedded_entries: usize,

    /// Directory for unpacked and embedded temporary files
    #[serde(default)]
    pub temp_dir: Option<String>,

    #[serde(default)]
    pub validators: ValidatorConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            embedded_files: false,
            text_extraction: TextExtraction::None,
            max_embedded_depth: default_max_embedded_depth(),
            max_embedded_entries: default_max_embedded_entries(),
            temp_dir: None,
            validators: ValidatorConfig::default(),
        }
    }
}

/// External validation tools
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorConfig {
    /// JHove launcher shell script
    pub jhove: Option<String>,

    /// veraPDF command line tool
    pub verapdf: Option<String>,

    /// PDFBox preflight validator (jar file)
    pub pdfbox_validator: Option<String>,

    /// callas pdfaPilot command line tool
    pub callas_pdfapilot: Option<String>,

    /// DPF Manager (jar file), used for TIFF images
    pub dpf_manager: Option<String>,

    /// 3-Heights PDF Validator shell tool
    pub three_heights_validator: Option<String>,

    /// License key passed to the 3-Heights PDF Validator
    pub three_heights_license: Option<String>,

    /// Skip PDF validation for files not claiming PDF/A conformance
    #[serde(default)]
    pub validate_only_pdfa: bool,
}

/// Liveness monitor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WatchdogConfig {
    /// Time between liveness checks (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Consecutive all-idle readings required before completion
    #[serde(default = "default_quiet_ticks")]
    pub quiet_ticks: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            quiet_ticks: default_quiet_ticks(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// File receiving the XML report; stdout if absent
    #[serde(rename = "report-path", default)]
    pub report_path: Option<String>,
}

fn default_max_visited_pages() -> usize {
    1024
}

fn default_max_parallel_downloads() -> usize {
    8
}

fn default_crawler_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    60
}

fn default_max_page_bytes() -> u64 {
    16 * 1024 * 1024
}

fn default_max_file_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_file_pattern() -> String {
    "/tmp/docscan/%{h:4}/%{h}_%{s}".to_string()
}

fn default_max_embedded_depth() -> usize {
    8
}

fn default_max_embedded_entries() -> usize {
    256
}

fn default_poll_interval() -> u64 {
    500
}

fn default_quiet_ticks() -> u32 {
    2
}
