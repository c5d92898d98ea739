//! PDF analyzer
//!
//! Reads what is visible without decoding streams: header version, the
//! document information dictionary, XMP packets (PDF/A identification) and the
//! page tree. Configured validators run afterwards.

use super::validator::Validators;
use super::{attach_text, base_report, AnalysisContext, Analyzer, FileFormat};
use crate::config::TextExtraction;
use crate::output::{format_date_time, Report};
use crate::{DocScanError, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::bytes::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Information dictionary keys and their report names
const INFO_FIELDS: &[(&str, &str)] = &[
    ("Title", "title"),
    ("Author", "author"),
    ("Subject", "subject"),
    ("Keywords", "keywords"),
    ("Creator", "creator"),
    ("Producer", "producer"),
];

const DATE_FIELDS: &[(&str, &str)] = &[
    ("CreationDate", "creationdate"),
    ("ModDate", "modificationdate"),
];

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%PDF-(\d\.\d)").expect("valid pattern"));
static PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/Type\s*/Page\b").expect("valid pattern"));
static LINEARIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/Linearized\b").expect("valid pattern"));
static ENCRYPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/Encrypt\b").expect("valid pattern"));

/// `/Key (literal string)` entries anywhere in the file
static LITERAL_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)/([A-Za-z]+)\s*\(((?:[^()\\]|\\.)*)\)").expect("valid pattern")
});
static PDF_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^D:(\d{4}(?:\d{2}){0,5})").expect("valid pattern"));
static XMP_CREATOR_TOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<xmp:CreatorTool>([^<]*)</xmp:CreatorTool>").expect("valid pattern")
});
static PDFA_PART: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"<pdfaid:part>\s*(\d)\s*</pdfaid:part>").expect("valid pattern"),
        Regex::new(r#"pdfaid:part=["'](\d)["']"#).expect("valid pattern"),
    ]
});
static PDFA_CONFORMANCE: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"<pdfaid:conformance>\s*([A-Za-z])\s*</pdfaid:conformance>")
            .expect("valid pattern"),
        Regex::new(r#"pdfaid:conformance=["']([A-Za-z])["']"#).expect("valid pattern"),
    ]
});
static SHOW_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\(((?:[^()\\]|\\.)*)\)\s*Tj").expect("valid pattern")
});

#[derive(Debug, Default)]
pub struct PdfAnalyzer {
    text_extraction: TextExtraction,
    validators: Validators,
}

impl Analyzer for PdfAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::Pdf
    }

    fn analyze_file(&self, path: &Path, _context: &AnalysisContext<'_>) -> Result<Report> {
        let content = std::fs::read(path)?;
        let version = header_version(&content).ok_or_else(|| DocScanError::Analyzer {
            path: path.to_path_buf(),
            message: "missing %PDF header".to_string(),
        })?;

        let mut report = base_report(FileFormat::Pdf, content.len() as u64);
        report.set_attribute("version", &version);
        report.set_attribute("pages", count_pages(&content));
        report.set_attribute("linearized", LINEARIZED.is_match(&content));
        report.set_attribute("encrypted", ENCRYPT.is_match(&content));

        report.push_child(info_report(&content));

        let pdfa = pdfa_claim(&content);
        if let Some((part, conformance)) = &pdfa {
            let mut claim = Report::new("pdfa").with_attribute("part", part);
            if let Some(conformance) = conformance {
                claim.set_attribute("conformance", conformance);
            }
            report.push_child(claim);
        }

        if self.text_extraction != TextExtraction::None {
            attach_text(&mut report, self.text_extraction, &show_text(&content));
        }

        let options = self.validators.pdfa_options;
        if pdfa.is_none() && options.validate_only_pdfa {
            tracing::debug!("Not validating {}: no PDF/A claim", path.display());
        } else {
            for validation in self.validators.validate_pdf(path) {
                report.push_child(validation);
            }
        }

        Ok(report)
    }

    fn set_text_extraction(&mut self, mode: TextExtraction) {
        self.text_extraction = mode;
    }

    fn set_validators(&mut self, validators: &Validators) {
        self.validators = validators.clone();
    }
}

fn capture(content: &[u8], regex: &Regex) -> Option<String> {
    let value = regex.captures(content)?.get(1)?;
    Some(String::from_utf8_lossy(value.as_bytes()).trim().to_string())
}

fn header_version(content: &[u8]) -> Option<String> {
    // The header may be preceded by junk within the first kilobyte
    let head = &content[..content.len().min(1024)];
    capture(head, &HEADER)
}

fn count_pages(content: &[u8]) -> usize {
    PAGE.find_iter(content).count()
}

/// First literal string value of every `/Key (...)` entry
fn literal_entries(content: &[u8]) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for captures in LITERAL_ENTRY.captures_iter(content) {
        let (Some(key), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        entries
            .entry(String::from_utf8_lossy(key.as_bytes()).into_owned())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).trim().to_string());
    }
    entries
}

/// Information dictionary entries plus XMP tool names as a `<meta>` report
fn info_report(content: &[u8]) -> Report {
    let mut meta = Report::new("meta");
    let entries = literal_entries(content);

    for (key, name) in INFO_FIELDS {
        if let Some(value) = entries.get(*key).filter(|value| !value.is_empty()) {
            let mut node = Report::new(*name);
            node.text = unescape_literal(value);
            meta.push_child(node);
        }
    }

    for (key, name) in DATE_FIELDS {
        let date = entries
            .get(*key)
            .and_then(|value| capture(value.as_bytes(), &PDF_DATE))
            .and_then(|digits| parse_pdf_date(&digits));
        if let Some(date) = date {
            meta.push_child(format_date_time(date, name));
        }
    }

    if let Some(tool) = capture(content, &XMP_CREATOR_TOOL) {
        let mut node = Report::new("xmpcreatortool");
        node.text = tool;
        meta.push_child(node);
    }

    meta
}

/// Parses the digits of a PDF date (`D:YYYYMMDDHHmmSS`); missing parts default
fn parse_pdf_date(digits: &str) -> Option<DateTime<Utc>> {
    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        match digits.get(range) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6, 1)?, field(6..8, 1)?)?;
    let datetime = date.and_hms_opt(field(8..10, 0)?, field(10..12, 0)?, field(12..14, 0)?)?;
    Some(Utc.from_utc_datetime(&datetime))
}

/// Resolves the common escapes of a PDF literal string
fn unescape_literal(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}

/// PDF/A part and conformance level claimed in the XMP metadata
fn pdfa_claim(content: &[u8]) -> Option<(String, Option<String>)> {
    let part = PDFA_PART.iter().find_map(|regex| capture(content, regex))?;
    let conformance = PDFA_CONFORMANCE
        .iter()
        .find_map(|regex| capture(content, regex))
        .map(|level| level.to_uppercase());
    Some((part, conformance))
}

/// Strings shown by `Tj` operators in uncompressed content streams
fn show_text(content: &[u8]) -> String {
    SHOW_TEXT
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|text| unescape_literal(&String::from_utf8_lossy(text.as_bytes())))
        .collect::<Vec<_>>()
        .join(" ")
}
