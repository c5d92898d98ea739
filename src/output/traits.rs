//! Report types and the sink trait analyzers emit into
//!
//! A [`Report`] is a named element with an attribute map, an optional text body
//! and nested child reports (for example one per embedded file).

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Structured analysis result for one file or one aspect of a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Element name, e.g. `fileanalysis` or `meta`
    pub name: String,

    /// Attributes, kept sorted for stable output
    pub attributes: BTreeMap<String, String>,

    /// Plain text body (escaped on serialization)
    pub text: String,

    /// Nested reports
    pub children: Vec<Report>,
}

impl Report {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attributes.insert(key.into(), value.to_string());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn push_child(&mut self, child: Report) {
        self.children.push(child);
    }

    /// Finds the first direct child with the given element name
    pub fn child(&self, name: &str) -> Option<&Report> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Receives finished reports
///
/// Implementations must be callable from any thread: analyses run on the
/// blocking thread pool.
pub trait ReportSink: Send + Sync {
    /// Consumes one finished report
    fn emit(&self, report: Report) -> OutputResult<()>;
}

/// Writes every report as XML to a writer (stdout or a file)
pub struct XmlReportSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> XmlReportSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ReportSink for XmlReportSink<W> {
    fn emit(&self, report: Report) -> OutputResult<()> {
        let text = super::xml::xml_node_to_text(&report);
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| OutputError::Write("report writer lock poisoned".to_string()))?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps reports in memory; used by tests and by library callers that post-process
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<Report>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all reports received so far
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for CollectingSink {
    fn emit(&self, report: Report) -> OutputResult<()> {
        self.reports
            .lock()
            .map_err(|_| OutputError::Write("report buffer lock poisoned".to_string()))?
            .push(report);
        Ok(())
    }
}
