//! Office Open XML analyzer (docx, xlsx, pptx)

use super::container::{
    analyze_embedded_entries, element_text, metadata_report, open_archive, read_text_entry,
    strip_tags,
};
use super::{attach_text, base_report, AnalysisContext, Analyzer, FileFormat};
use crate::config::TextExtraction;
use crate::output::Report;
use crate::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const CORE_FIELDS: &[(&str, &str)] = &[
    ("dc:title", "title"),
    ("dc:subject", "subject"),
    ("dc:language", "language"),
    ("dc:creator", "creator"),
    ("cp:lastModifiedBy", "lastmodifiedby"),
    ("dcterms:created", "creationdate"),
    ("dcterms:modified", "modificationdate"),
    ("cp:revision", "revision"),
];

const DATE_FIELDS: &[&str] = &["creationdate", "modificationdate"];

/// Main part content types and the document mimetype they imply
const MAIN_PARTS: &[(&str, &str, &str)] = &[
    (
        "wordprocessingml.document.main",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "word/document.xml",
    ),
    (
        "spreadsheetml.sheet.main",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xl/sharedStrings.xml",
    ),
    (
        "presentationml.presentation.main",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt/slides/slide1.xml",
    ),
];

#[derive(Debug, Default)]
pub struct OpenXmlAnalyzer {
    text_extraction: TextExtraction,
}

impl Analyzer for OpenXmlAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::OpenXml
    }

    fn analyze_file(&self, path: &Path, context: &AnalysisContext<'_>) -> Result<Report> {
        let size = std::fs::metadata(path)?.len();
        let mut archive = open_archive(path)?;
        let mut report = base_report(FileFormat::OpenXml, size);

        let content_types = read_text_entry(&mut archive, "[Content_Types].xml")?.unwrap_or_default();
        let main_part = MAIN_PARTS
            .iter()
            .find(|(marker, _, _)| content_types.contains(marker));
        if let Some((_, mimetype, _)) = main_part {
            report.set_attribute("mimetype", mimetype);
        }

        let mut meta = match read_text_entry(&mut archive, "docProps/core.xml")? {
            Some(core) => metadata_report(&core, CORE_FIELDS, DATE_FIELDS),
            None => Report::new("meta"),
        };
        if let Some(app) = read_text_entry(&mut archive, "docProps/app.xml")? {
            if let Some(generator) = generator(&app) {
                let mut node = Report::new("generator");
                node.text = generator;
                meta.push_child(node);
            }
        }
        report.push_child(meta);

        if self.text_extraction != TextExtraction::None {
            if let Some((_, _, text_part)) = main_part {
                if let Some(content) = read_text_entry(&mut archive, text_part)? {
                    attach_text(&mut report, self.text_extraction, &body_text(&content));
                }
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

/// `Application AppVersion` from docProps/app.xml
fn generator(app: &str) -> Option<String> {
    let application = element_text(app, "Application")?;
    Some(match element_text(app, "AppVersion") {
        Some(version) => format!("{} {}", application, version),
        None => application,
    })
}

static TEXT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?t(?:\s[^>]*)?>([^<]*)</(?:\w+:)?t>").expect("valid pattern")
});

/// Text runs (`<w:t>`, `<a:t>`, `<t>`) joined by spaces
fn body_text(xml: &str) -> String {
    let text: Vec<&str> = TEXT_RUN
        .captures_iter(xml)
        .filter_map(|captures| captures.get(1))
        .map(|run| run.as_str())
        .collect();
    strip_tags(&text.join(" "))
}

fn is_embedded_entry(name: &str) -> bool {
    name.contains("/embeddings/") || name.contains("/media/")
}
