//! Plain ZIP archive analyzer

use super::container::{analyze_embedded_entries, open_archive};
use super::{base_report, AnalysisContext, Analyzer, FileFormat};
use crate::config::TextExtraction;
use crate::output::Report;
use crate::Result;
use std::path::Path;

/// Lists archive statistics; every member file counts as embedded
#[derive(Debug, Default)]
pub struct ZipAnalyzer;

impl Analyzer for ZipAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::Zip
    }

    fn analyze_file(&self, path: &Path, context: &AnalysisContext<'_>) -> Result<Report> {
        let size = std::fs::metadata(path)?.len();
        let mut archive = open_archive(path)?;
        let mut report = base_report(FileFormat::Zip, size);

        let mut files = 0usize;
        let mut uncompressed = 0u64;
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            if !entry.is_dir() {
                files += 1;
                uncompressed += entry.size();
            }
        }
        report.set_attribute("entries", files);
        report.set_attribute("uncompressedsize", uncompressed);

        if !archive.comment().is_empty() {
            let mut comment = Report::new("comment");
            comment.text = String::from_utf8_lossy(archive.comment()).into_owned();
            report.push_child(comment);
        }

        for embedded in analyze_embedded_entries(&mut archive, context, |_| true) {
            report.push_child(embedded);
        }

        Ok(report)
    }

    // Archives carry no text of their own
    fn set_text_extraction(&mut self, _mode: TextExtraction) {}
}
