//! Compound binary (OLE2) analyzer for legacy office files

use super::{base_report, AnalysisContext, Analyzer, FileFormat};
use crate::config::TextExtraction;
use crate::output::Report;
use crate::{DocScanError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const OLE_MAGIC: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";

/// Size of the header plus the first directory sectors scanned for stream names
const SCAN_LIMIT: u64 = 1024 * 1024;

/// Directory stream names identifying the producing application
const APPLICATION_STREAMS: &[(&str, &str)] = &[
    ("WordDocument", "word"),
    ("Workbook", "excel"),
    ("Book", "excel"),
    ("PowerPoint Document", "powerpoint"),
];

/// Header fields of a compound binary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OleHeader {
    minor_version: u16,
    major_version: u16,
    sector_size: u32,
    fat_sectors: u32,
}

fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(offset..offset + 2)?.try_into().ok()?))
}

fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?))
}

fn parse_header(data: &[u8]) -> Option<OleHeader> {
    if !data.starts_with(OLE_MAGIC) {
        return None;
    }

    let sector_shift = le_u16(data, 0x1e)?;
    if !(7..=16).contains(&sector_shift) {
        return None;
    }

    Some(OleHeader {
        minor_version: le_u16(data, 0x18)?,
        major_version: le_u16(data, 0x1a)?,
        sector_size: 1 << sector_shift,
        fat_sectors: le_u32(data, 0x2c)?,
    })
}

/// Looks for a well-known stream name (UTF-16LE) in the scanned data
fn application(data: &[u8]) -> Option<&'static str> {
    APPLICATION_STREAMS.iter().find_map(|(stream, application)| {
        let needle: Vec<u8> = stream.encode_utf16().flat_map(u16::to_le_bytes).collect();
        data.windows(needle.len())
            .any(|window| window == needle.as_slice())
            .then_some(*application)
    })
}

#[derive(Debug, Default)]
pub struct CompoundBinaryAnalyzer;

impl Analyzer for CompoundBinaryAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::CompoundBinary
    }

    fn analyze_file(&self, path: &Path, _context: &AnalysisContext<'_>) -> Result<Report> {
        let size = std::fs::metadata(path)?.len();
        let mut data = Vec::new();
        File::open(path)?.take(SCAN_LIMIT).read_to_end(&mut data)?;

        let header = parse_header(&data).ok_or_else(|| DocScanError::Analyzer {
            path: path.to_path_buf(),
            message: "not a compound binary file".to_string(),
        })?;

        let mut report = base_report(FileFormat::CompoundBinary, size)
            .with_attribute("majorversion", header.major_version)
            .with_attribute("minorversion", header.minor_version)
            .with_attribute("sectorsize", header.sector_size)
            .with_attribute("fatsectors", header.fat_sectors);
        if let Some(application) = application(&data) {
            report.set_attribute("application", application);
        }

        Ok(report)
    }

    // Streams are not decoded, so there is no text to extract
    fn set_text_extraction(&mut self, _mode: TextExtraction) {}
}
