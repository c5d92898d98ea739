//! Helpers shared by the ZIP-based analyzers (ODF, OpenXML, plain ZIP)

use super::AnalysisContext;
use crate::output::{format_date_time, dexmlify, Report};
use crate::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::LazyLock;
use zip::result::ZipError;
use zip::ZipArchive;

/// Largest XML part read into memory
const MAX_XML_ENTRY: u64 = 8 * 1024 * 1024;

/// Largest embedded file extracted for recursive analysis
const MAX_EMBEDDED_ENTRY: u64 = 64 * 1024 * 1024;

/// Element holding only text: name, attributes, text, closing name
static TEXT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([\w:.-]+)(\s[^>]*)?>([^<]*)</([\w:.-]+)>").expect("valid pattern")
});
static START_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([\w:.-]+)(\s[^>]*)?/?>").expect("valid pattern"));
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s([\w:.-]+)="([^"]*)""#).expect("valid pattern"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid pattern"));

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    Ok(ZipArchive::new(File::open(path)?)?)
}

/// Reads an archive entry as text; `None` if the entry does not exist
pub(crate) fn read_text_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = Vec::new();
    entry.take(MAX_XML_ENTRY).read_to_end(&mut content)?;
    Ok(Some(String::from_utf8_lossy(&content).into_owned()))
}

/// Text content of the first `<tag>` element, entities resolved
pub(crate) fn element_text(xml: &str, tag: &str) -> Option<String> {
    let captures = TEXT_ELEMENT
        .captures_iter(xml)
        .find(|captures| &captures[1] == tag && &captures[4] == tag)?;

    let text = dexmlify(captures[3].trim());
    (!text.is_empty()).then_some(text)
}

/// Value of `attribute` on the first `<element>` start tag
pub(crate) fn attribute_value(xml: &str, element: &str, attribute: &str) -> Option<String> {
    let start = START_TAG
        .captures_iter(xml)
        .find(|captures| &captures[1] == element)?;
    let attributes = start.get(2)?.as_str();

    ATTRIBUTE
        .captures_iter(attributes)
        .find(|captures| &captures[1] == attribute)
        .map(|captures| dexmlify(&captures[2]))
}

/// Plain text of an XML document: tags removed, whitespace collapsed
pub(crate) fn strip_tags(xml: &str) -> String {
    let text = TAG.replace_all(xml, " ");
    dexmlify(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Builds a `<meta>` report from `(xml tag, report name)` pairs
///
/// Fields listed in `date_fields` additionally get a `<date>` child when the
/// value parses as a timestamp.
pub(crate) fn metadata_report(xml: &str, fields: &[(&str, &str)], date_fields: &[&str]) -> Report {
    let mut meta = Report::new("meta");

    for (tag, name) in fields {
        let Some(value) = element_text(xml, tag) else {
            continue;
        };

        if date_fields.contains(name) {
            if let Some(timestamp) = parse_timestamp(&value) {
                meta.push_child(format_date_time(timestamp, name));
            }
        }

        let mut node = Report::new(*name);
        node.text = value;
        meta.push_child(node);
    }

    meta
}

/// Parses the timestamp styles found in office metadata
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Analyzes the entries selected by `is_embedded`, bounded by the context's limits
pub(crate) fn analyze_embedded_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    context: &AnalysisContext<'_>,
    is_embedded: impl Fn(&str) -> bool,
) -> Vec<Report> {
    if !context.analyze_embedded_files() {
        return Vec::new();
    }

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/') && is_embedded(name))
        .map(str::to_string)
        .collect();
    names.sort();

    let limit = context.max_embedded_entries();
    if names.len() > limit {
        tracing::warn!(
            "Container holds {} embedded files, analyzing only the first {}",
            names.len(),
            limit
        );
    }

    names
        .iter()
        .take(limit)
        .map(|name| analyze_entry(archive, context, name))
        .collect()
}

fn analyze_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    context: &AnalysisContext<'_>,
    name: &str,
) -> Report {
    let mut report = Report::new("embeddedfile").with_attribute("name", name);

    let content = match read_entry_bytes(archive, name) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cannot extract embedded file {}: {}", name, e);
            report.set_attribute("status", "error");
            report.set_attribute("message", e);
            return report;
        }
    };
    report.set_attribute("size", content.len());

    match context.analyze_embedded(name, &content) {
        Ok(Some(nested)) => {
            report.set_attribute("status", "ok");
            report.push_child(nested);
        }
        Ok(None) => report.set_attribute("status", "unknown"),
        Err(e) => {
            tracing::warn!("Analysis of embedded file {} failed: {}", name, e);
            report.set_attribute("status", "error");
            report.set_attribute("message", e);
        }
    }

    report
}

fn read_entry_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let entry = archive.by_name(name)?;
    let mut content = Vec::new();
    entry.take(MAX_EMBEDDED_ENTRY).read_to_end(&mut content)?;
    Ok(content)
}
