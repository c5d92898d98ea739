//! XML serialization of reports
//!
//! The output keeps the shape of DocScan's established report format: sorted
//! attributes, self-closing elements without body, one element per line.

use super::traits::Report;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Serializes a report (and its children) into XML text
pub fn xml_node_to_text(node: &Report) -> String {
    let mut result = format!("<{}", node.name);
    for (key, value) in &node.attributes {
        result.push_str(&format!(" {}=\"{}\"", key, xmlify(value)));
    }

    if node.text.is_empty() && node.children.is_empty() {
        result.push_str(" />\n");
        return result;
    }

    result.push_str(">\n");
    if !node.text.is_empty() {
        result.push_str(&xmlify_lines(&node.text));
        result.push('\n');
    }
    for child in &node.children {
        result.push_str(&xml_node_to_text(child));
    }
    result.push_str(&format!("</{}>\n", node.name));

    result
}

/// Makes a single-line text XML-safe
///
/// Tabs and line breaks become spaces, control characters are dropped,
/// runs of whitespace collapse and `& < > " '` are escaped.
pub fn xmlify(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            other => other,
        })
        .filter(|c| !c.is_control())
        .collect();

    let simplified = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut result = String::with_capacity(simplified.len());
    for c in simplified.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            other => result.push(other),
        }
    }
    result
}

/// Like [`xmlify`], but keeps line breaks
pub fn xmlify_lines(text: &str) -> String {
    text.lines().map(xmlify).collect::<Vec<_>>().join("\n")
}

/// Reverts the entity escaping done by [`xmlify`]
pub fn dexmlify(xml: &str) -> String {
    xml.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Builds an element from a key and attribute map; the empty key holds the body
///
/// Returns an empty string for an empty map.
pub fn format_map(key: &str, attrs: &BTreeMap<String, String>) -> String {
    if attrs.is_empty() {
        return String::new();
    }

    let mut report = Report::new(key);
    for (name, value) in attrs {
        if name.is_empty() {
            report.text = value.clone();
        } else {
            report.set_attribute(name.as_str(), value);
        }
    }
    xml_node_to_text(&report)
}

/// Creates a `<date>` report for a calendar date
pub fn format_date(date: NaiveDate, base: &str) -> Report {
    let epoch = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default();

    date_report(base, epoch, &date.format("%Y-%m-%d").to_string(), date)
}

/// Creates a `<date>` report with time-of-day attributes
pub fn format_date_time(datetime: DateTime<Utc>, base: &str) -> Report {
    use chrono::Timelike;

    let mut report = date_report(
        base,
        datetime.timestamp(),
        &datetime.to_rfc3339(),
        datetime.date_naive(),
    );
    report.set_attribute("hour", datetime.hour());
    report.set_attribute("minute", datetime.minute());
    report.set_attribute("second", datetime.second());
    report
}

fn date_report(base: &str, epoch: i64, text: &str, date: NaiveDate) -> Report {
    use chrono::Datelike;

    let mut report = Report::new("date")
        .with_attribute("epoch", epoch)
        .with_attribute("year", date.year())
        .with_attribute("month", date.month())
        .with_attribute("day", date.day());
    if !base.is_empty() {
        report.set_attribute("base", base);
    }
    report.text = text.to_string();
    report
}
