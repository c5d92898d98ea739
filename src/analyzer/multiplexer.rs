//! Type dispatcher routing files to format analyzers
//!
//! # Dispatch
//!
//! 1. Classify by content signature, falling back to the file extension
//! 2. Compressed wrappers (gzip, bzip2, xz) are unpacked with the external tool
//!    into a temporary file, which is analyzed recursively
//! 3. Known formats go to the analyzer registered for them
//! 4. Unknown files are reported at `warn` and skipped
//!
//! Temporary files are held as [`TempPath`] and deleted when it is dropped, so
//! they disappear on every exit path of the analysis using them.

use super::format::{classify_file, Classification};
use super::validator::{PdfAValidationOptions, Validators};
use super::{
    Analyzer, CompoundBinaryAnalyzer, FileFormat, Jp2Analyzer, JpegAnalyzer, OdfAnalyzer,
    OpenXmlAnalyzer, PdfAnalyzer, TiffAnalyzer, ZipAnalyzer,
};
use crate::config::{AnalyzerConfig, TextExtraction};
use crate::output::Report;
use crate::url::file_extension;
use crate::watchdog::Watchable;
use crate::{DocScanError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{Builder, NamedTempFile, TempPath};

/// An analyzer plus the number of analyses it is currently running
struct AnalyzerSlot {
    analyzer: Box<dyn Analyzer>,
    busy: AtomicUsize,
}

/// Decrements a slot's busy counter when the analysis ends, however it ends
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Routes files to one analyzer per [`FileFormat`]
///
/// The analyzer binding is fixed at construction. Configuration setters take
/// `&mut self` and are meant to be called before the first analysis.
pub struct Multiplexer {
    slots: Vec<AnalyzerSlot>,
    analyze_embedded: bool,
    max_embedded_depth: usize,
    max_embedded_entries: usize,
    temp_dir: Option<PathBuf>,
    validators: Validators,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplexer {
    pub fn new() -> Self {
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(OdfAnalyzer::default()),
            Box::new(OpenXmlAnalyzer::default()),
            Box::new(ZipAnalyzer::default()),
            Box::new(PdfAnalyzer::default()),
            Box::new(CompoundBinaryAnalyzer::default()),
            Box::new(JpegAnalyzer::default()),
            Box::new(Jp2Analyzer::default()),
            Box::new(TiffAnalyzer::default()),
        ];

        Self {
            slots: analyzers
                .into_iter()
                .map(|analyzer| AnalyzerSlot {
                    analyzer,
                    busy: AtomicUsize::new(0),
                })
                .collect(),
            analyze_embedded: false,
            max_embedded_depth: 8,
            max_embedded_entries: 256,
            temp_dir: None,
            validators: Validators::default(),
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let mut multiplexer = Self::new();
        multiplexer.set_text_extraction(config.text_extraction);
        multiplexer.set_analyze_embedded_files(config.embedded_files);
        multiplexer.set_embedded_limits(config.max_embedded_depth, config.max_embedded_entries);
        if let Some(dir) = &config.temp_dir {
            multiplexer.set_temp_dir(dir);
        }

        let tools = &config.validators;
        if let Some(script) = &tools.jhove {
            multiplexer.setup_jhove(script);
        }
        if let Some(cli) = &tools.verapdf {
            multiplexer.setup_verapdf(cli);
        }
        if let Some(jar) = &tools.pdfbox_validator {
            multiplexer.setup_pdfbox_validator(jar);
        }
        if let Some(cli) = &tools.callas_pdfapilot {
            multiplexer.setup_callas_pdfapilot(cli);
        }
        if let Some(jar) = &tools.dpf_manager {
            multiplexer.setup_dpf_manager(jar);
        }
        if let Some(cli) = &tools.three_heights_validator {
            multiplexer.setup_three_heights_validator(cli, tools.three_heights_license.as_deref());
        }
        multiplexer.set_pdfa_validation_options(PdfAValidationOptions {
            validate_only_pdfa: tools.validate_only_pdfa,
        });

        multiplexer
    }

    /// Analyzes a file, returning `None` if its format is not recognized
    pub fn analyze_file(&self, path: &Path) -> Result<Option<Report>> {
        self.analyze_at_depth(path, 0)
    }

    /// Unpacks `path` with `tool -dc` into a temporary file and analyzes that
    ///
    /// `extension` is the compression suffix (e.g. `gz`); stripping it from the
    /// file name gives the suffix used for the temporary file.
    pub fn uncompress_analyze_file(
        &self,
        path: &Path,
        extension: &str,
        tool: &str,
    ) -> Result<Option<Report>> {
        self.uncompress_at_depth(path, extension, tool, 0)
    }

    /// Analyzes a file and deletes it afterwards, whatever the outcome
    pub fn analyze_temporary_file(&self, path: impl Into<PathBuf>) -> Result<Option<Report>> {
        self.analyze_temporary_at_depth(TempPath::from_path(path), 0)
    }

    /// Returns true while any analyzer is working on a file
    pub fn is_busy(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.busy.load(Ordering::Acquire) > 0)
    }

    pub fn set_text_extraction(&mut self, mode: TextExtraction) {
        for slot in &mut self.slots {
            slot.analyzer.set_text_extraction(mode);
        }
    }

    pub fn set_analyze_embedded_files(&mut self, enabled: bool) {
        self.analyze_embedded = enabled;
        for slot in &mut self.slots {
            slot.analyzer.set_analyze_embedded_files(enabled);
        }
    }

    /// Bounds recursion into embedded files and compressed wrappers
    ///
    /// Every unpacked layer and every embedded file counts as one level.
    pub fn set_embedded_limits(&mut self, max_depth: usize, max_entries: usize) {
        self.max_embedded_depth = max_depth;
        self.max_embedded_entries = max_entries;
    }

    /// Directory for unpacked and embedded files; the system default if unset
    pub fn set_temp_dir(&mut self, dir: impl Into<PathBuf>) {
        self.temp_dir = Some(dir.into());
    }

    fn temp_file(&self, prefix: &str, suffix: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = Builder::new();
        builder.prefix(prefix).suffix(suffix);
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    pub fn setup_jhove(&mut self, shell_script: &str) {
        self.validators.jhove = Some(shell_script.to_string());
        self.forward_validators();
    }

    pub fn setup_verapdf(&mut self, cli_tool: &str) {
        self.validators.verapdf = Some(cli_tool.to_string());
        self.forward_validators();
    }

    pub fn setup_pdfbox_validator(&mut self, jar: &str) {
        self.validators.pdfbox_validator = Some(jar.to_string());
        self.forward_validators();
    }

    pub fn setup_callas_pdfapilot(&mut self, cli_tool: &str) {
        self.validators.callas_pdfapilot = Some(cli_tool.to_string());
        self.forward_validators();
    }

    pub fn setup_dpf_manager(&mut self, jar: &str) {
        self.validators.dpf_manager = Some(jar.to_string());
        self.forward_validators();
    }

    pub fn setup_three_heights_validator(&mut self, cli_tool: &str, license_key: Option<&str>) {
        self.validators.three_heights_validator = Some(cli_tool.to_string());
        self.validators.three_heights_license = license_key.map(str::to_string);
        self.forward_validators();
    }

    pub fn set_pdfa_validation_options(&mut self, options: PdfAValidationOptions) {
        self.validators.pdfa_options = options;
        self.forward_validators();
    }

    fn forward_validators(&mut self) {
        for slot in &mut self.slots {
            slot.analyzer.set_validators(&self.validators);
        }
    }

    fn analyze_at_depth(&self, path: &Path, depth: usize) -> Result<Option<Report>> {
        match classify_file(path)? {
            Classification::Format(format) => self.delegate(format, path, depth).map(Some),
            Classification::Compressed(compression) => {
                self.uncompress_at_depth(path, compression.extension(), compression.tool(), depth)
            }
            Classification::Unknown => {
                tracing::warn!("Unknown file type, skipping {}", path.display());
                Ok(None)
            }
        }
    }

    fn delegate(&self, format: FileFormat, path: &Path, depth: usize) -> Result<Report> {
        let slot = self
            .slots
            .iter()
            .find(|slot| slot.analyzer.format() == format)
            .ok_or_else(|| DocScanError::Analyzer {
                path: path.to_path_buf(),
                message: format!("no analyzer registered for {}", format),
            })?;

        tracing::debug!("Analyzing {} as {}", path.display(), format);
        let _busy = BusyGuard::enter(&slot.busy);

        let context = AnalysisContext {
            multiplexer: self,
            depth,
        };
        let mut report = slot.analyzer.analyze_file(path, &context)?;
        report.set_attribute("filename", path.display());
        report.set_attribute("status", "ok");
        if depth > 0 {
            report.set_attribute("depth", depth);
        }

        Ok(report)
    }

    fn uncompress_at_depth(
        &self,
        path: &Path,
        extension: &str,
        tool: &str,
        depth: usize,
    ) -> Result<Option<Report>> {
        let decompress_error = |message: String| DocScanError::Decompress {
            path: path.to_path_buf(),
            tool: tool.to_string(),
            message,
        };

        // A self-reproducing archive would otherwise unpack forever
        if depth >= self.max_embedded_depth {
            return Err(decompress_error(format!(
                "more than {} nested layers",
                self.max_embedded_depth
            )));
        }

        // report.pdf.gz unpacks to a temporary *.pdf
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let inner_name = filename
            .strip_suffix(&format!(".{}", extension))
            .unwrap_or(&filename);
        let suffix = file_extension(inner_name)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let temp = self.temp_file("docscan-", &suffix)?;
        let output = temp.reopen()?;
        let temp = temp.into_temp_path();

        let status = Command::new(tool)
            .arg("-dc")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::null())
            .status()
            .map_err(|e| decompress_error(e.to_string()))?;

        if !status.success() {
            return Err(decompress_error(format!("exited with {}", status)));
        }

        tracing::debug!("Unpacked {} with {} to {}", path.display(), tool, temp.display());

        let report = self.analyze_temporary_at_depth(temp, depth + 1)?;
        Ok(report.map(|mut report| {
            // The report describes the wrapper, at the wrapper's own depth
            report.attributes.remove("depth");
            if depth > 0 {
                report.set_attribute("depth", depth);
            }
            report.set_attribute("filename", path.display());
            report.set_attribute("compression", extension);
            report
        }))
    }

    fn analyze_temporary_at_depth(&self, temp: TempPath, depth: usize) -> Result<Option<Report>> {
        let result = self.analyze_at_depth(&temp, depth);
        if let Err(e) = temp.close() {
            tracing::warn!("Failed to remove temporary file: {}", e);
        }
        result
    }
}

impl Watchable for Multiplexer {
    fn name(&self) -> &str {
        "multiplexer"
    }

    fn is_alive(&self) -> bool {
        self.is_busy()
    }
}

/// Handed to analyzers; gives access to recursive analysis of embedded files
pub struct AnalysisContext<'a> {
    multiplexer: &'a Multiplexer,
    depth: usize,
}

impl AnalysisContext<'_> {
    /// Nesting level: 0 for a top-level file
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if embedded files should be analyzed at this level
    pub fn analyze_embedded_files(&self) -> bool {
        self.multiplexer.analyze_embedded && self.depth < self.multiplexer.max_embedded_depth
    }

    /// Maximum number of embedded entries analyzed per container
    pub fn max_embedded_entries(&self) -> usize {
        self.multiplexer.max_embedded_entries
    }

    /// Writes an embedded file to a temporary file and analyzes it
    ///
    /// Returns `None` if recursion is disabled or too deep, or if the embedded
    /// file's format is unknown.
    pub fn analyze_embedded(&self, name: &str, content: &[u8]) -> Result<Option<Report>> {
        if !self.analyze_embedded_files() {
            return Ok(None);
        }

        let suffix = file_extension(name)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let mut file = self.multiplexer.temp_file("docscan-embedded-", &suffix)?;
        file.write_all(content)?;
        file.flush()?;

        self.multiplexer
            .analyze_temporary_at_depth(file.into_temp_path(), self.depth + 1)
    }
}
