//! OpenDocument analyzer (odt, ods, odp, ...)

use super::container::{
    analyze_embedded_entries, attribute_value, metadata_report, open_archive, read_text_entry,
    strip_tags,
};
use super::format::odf_mimetype;
use super::{attach_text, base_report, AnalysisContext, Analyzer, FileFormat};
use crate::config::TextExtraction;
use crate::output::Report;
use crate::Result;
use std::path::Path;

const META_FIELDS: &[(&str, &str)] = &[
    ("meta:generator", "generator"),
    ("dc:title", "title"),
    ("dc:subject", "subject"),
    ("dc:language", "language"),
    ("meta:initial-creator", "initialcreator"),
    ("dc:creator", "creator"),
    ("meta:creation-date", "creationdate"),
    ("dc:date", "modificationdate"),
    ("meta:editing-cycles", "editingcycles"),
    ("meta:editing-duration", "editingduration"),
];

const DATE_FIELDS: &[&str] = &["creationdate", "modificationdate"];

#[derive(Debug, Default)]
pub struct OdfAnalyzer {
    text_extraction: TextExtraction,
}

impl Analyzer for OdfAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::Odf
    }

    fn analyze_file(&self, path: &Path, context: &AnalysisContext<'_>) -> Result<Report> {
        let size = std::fs::metadata(path)?.len();
        let mut archive = open_archive(path)?;
        let mut report = base_report(FileFormat::Odf, size);

        if let Some(mimetype) = odf_mimetype(&mut archive) {
            report.set_attribute("mimetype", mimetype);
        }

        if let Some(meta) = read_text_entry(&mut archive, "meta.xml")? {
            if let Some(version) = attribute_value(&meta, "office:document-meta", "office:version") {
                report.set_attribute("version", version);
            }
            report.push_child(metadata_report(&meta, META_FIELDS, DATE_FIELDS));
        }

        if self.text_extraction != TextExtraction::None {
            if let Some(content) = read_text_entry(&mut archive, "content.xml")? {
                attach_text(&mut report, self.text_extraction, &strip_tags(&content));
            }
        }

        for embedded in analyze_embedded_entries(&mut archive, context, is_embedded_entry) {
            report.push_child(embedded);
        }

        Ok(report)
    }

    fn set_text_extraction(&mut self, mode: TextExtraction) {
        self.text_extraction = mode;
    }
}

/// Everything except the package's own structure counts as embedded
fn is_embedded_entry(name: &str) -> bool {
    let structural = name == "mimetype"
        || name.ends_with(".xml")
        || name.ends_with(".rdf")
        || name.starts_with("META-INF/")
        || name.starts_with("Thumbnails/")
        || name.starts_with("Configurations2/");
    !structural
}
