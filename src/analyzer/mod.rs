//! File analysis
//!
//! The [`Multiplexer`] identifies a file's format and hands it to the matching
//! [`Analyzer`]. Compressed wrappers are unpacked to temporary files first, and
//! container analyzers may recurse into embedded files through the
//! [`AnalysisContext`] they are given.

mod archive;
mod compound;
mod container;
mod format;
mod image;
mod multiplexer;
mod odf;
mod openxml;
mod pdf;
mod validator;

pub use archive::ZipAnalyzer;
pub use compound::CompoundBinaryAnalyzer;
pub use format::{
    classify_file, is_zip_content, suffix_for_content, Classification, Compression, FileFormat,
};
pub use image::{Jp2Analyzer, JpegAnalyzer, TiffAnalyzer};
pub use multiplexer::{AnalysisContext, Multiplexer};
pub use odf::OdfAnalyzer;
pub use openxml::OpenXmlAnalyzer;
pub use pdf::PdfAnalyzer;
pub use validator::{PdfAValidationOptions, Validators};

use crate::config::TextExtraction;
use crate::output::Report;
use crate::Result;
use std::path::Path;

/// Capability shared by all format-specific analyzers
///
/// `analyze_file` runs synchronously and returns the analyzer's report; the
/// [`Multiplexer`] adds the common attributes (file name, status).
///
/// Implementations must be reentrant. A container may embed a file of its own
/// format, and then `analyze_file` is called again on the same instance before
/// the outer call returns. Per-file state lives on the stack, never in `self`.
pub trait Analyzer: Send + Sync {
    /// Format family this analyzer understands
    fn format(&self) -> FileFormat;

    fn analyze_file(&self, path: &Path, context: &AnalysisContext<'_>) -> Result<Report>;

    fn set_text_extraction(&mut self, mode: TextExtraction);

    /// Container analyzers recurse into embedded files when enabled
    fn set_analyze_embedded_files(&mut self, _enabled: bool) {}

    /// External validation tools; ignored by analyzers that do not validate
    fn set_validators(&mut self, _validators: &Validators) {}
}

/// Report skeleton every analyzer starts from
pub(crate) fn base_report(format: FileFormat, size: u64) -> Report {
    Report::new("fileanalysis")
        .with_attribute("format", format)
        .with_attribute("size", size)
}

/// Applies a text extraction mode to extracted plain text
pub(crate) fn attach_text(report: &mut Report, mode: TextExtraction, text: &str) {
    match mode {
        TextExtraction::None => {}
        TextExtraction::Length => {
            report.push_child(Report::new("text").with_attribute("length", text.chars().count()));
        }
        TextExtraction::Full => {
            let mut node = Report::new("text").with_attribute("length", text.chars().count());
            node.text = text.to_string();
            report.push_child(node);
        }
    }
}
