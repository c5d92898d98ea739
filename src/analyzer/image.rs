//! Raster image analyzers: JPEG, JPEG 2000 and TIFF
//!
//! Only headers are parsed; pixel data is never decoded.

use super::validator::Validators;
use super::{base_report, AnalysisContext, Analyzer, FileFormat};
use crate::config::TextExtraction;
use crate::output::Report;
use crate::{DocScanError, Result};
use std::path::Path;

fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(offset..offset + 2)?.try_into().ok()?))
}

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(offset..offset + 4)?.try_into().ok()?))
}

fn malformed(path: &Path, message: &str) -> DocScanError {
    DocScanError::Analyzer {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Frame and application segment data of a JPEG file
#[derive(Debug, Default, PartialEq, Eq)]
struct JpegInfo {
    width: Option<u16>,
    height: Option<u16>,
    components: Option<u8>,
    precision: Option<u8>,
    jfif_version: Option<(u8, u8)>,
    exif: bool,
}

fn parse_jpeg(data: &[u8]) -> Option<JpegInfo> {
    if !data.starts_with(b"\xff\xd8") {
        return None;
    }

    let mut info = JpegInfo::default();
    let mut offset = 2;

    while offset + 4 <= data.len() {
        if data[offset] != 0xff {
            break;
        }
        let marker = data[offset + 1];
        // Fill bytes
        if marker == 0xff {
            offset += 1;
            continue;
        }
        // Start of scan or end of image: no more headers
        if marker == 0xda || marker == 0xd9 {
            break;
        }

        let length = usize::from(be_u16(data, offset + 2)?);
        let segment = data.get(offset + 4..offset + 2 + length)?;

        match marker {
            // SOF0..SOF15 without DHT, JPG and DAC
            0xc0..=0xcf if !matches!(marker, 0xc4 | 0xc8 | 0xcc) => {
                info.precision = segment.first().copied();
                info.height = be_u16(segment, 1);
                info.width = be_u16(segment, 3);
                info.components = segment.get(5).copied();
            }
            0xe0 if segment.starts_with(b"JFIF\0") => {
                info.jfif_version = Some((*segment.get(5)?, *segment.get(6)?));
            }
            0xe1 if segment.starts_with(b"Exif\0\0") => info.exif = true,
            _ => {}
        }

        offset += 2 + length;
    }

    Some(info)
}

#[derive(Debug, Default)]
pub struct JpegAnalyzer;

impl Analyzer for JpegAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::Jpeg
    }

    fn analyze_file(&self, path: &Path, _context: &AnalysisContext<'_>) -> Result<Report> {
        let data = std::fs::read(path)?;
        let info = parse_jpeg(&data).ok_or_else(|| malformed(path, "not a JPEG file"))?;

        let mut report = base_report(FileFormat::Jpeg, data.len() as u64);
        if let (Some(width), Some(height)) = (info.width, info.height) {
            report.set_attribute("width", width);
            report.set_attribute("height", height);
        }
        if let Some(components) = info.components {
            report.set_attribute("components", components);
        }
        if let Some(precision) = info.precision {
            report.set_attribute("bitspersample", precision);
        }
        if let Some((major, minor)) = info.jfif_version {
            report.set_attribute("jfif", format!("{}.{}", major, minor));
        }
        report.set_attribute("exif", info.exif);

        Ok(report)
    }

    fn set_text_extraction(&mut self, _mode: TextExtraction) {}
}

/// Image header of a JPEG 2000 file or raw codestream
#[derive(Debug, PartialEq, Eq)]
struct Jp2Info {
    container: &'static str,
    width: u32,
    height: u32,
    components: u16,
}

const JP2_SIGNATURE: &[u8] = b"\x00\x00\x00\x0cjP  \r\n\x87\n";
const CODESTREAM_START: &[u8] = b"\xff\x4f\xff\x51";

fn parse_jp2(data: &[u8]) -> Option<Jp2Info> {
    if data.starts_with(JP2_SIGNATURE) {
        let (width, height, components) = find_ihdr(data)?;
        return Some(Jp2Info {
            container: "jp2",
            width,
            height,
            components,
        });
    }

    if data.starts_with(CODESTREAM_START) {
        // SIZ: Lsiz, Rsiz, Xsiz, Ysiz, XOsiz, YOsiz, ..., Csiz
        let siz = &data[4..];
        let width = be_u32(siz, 4)?.checked_sub(be_u32(siz, 12)?)?;
        let height = be_u32(siz, 8)?.checked_sub(be_u32(siz, 16)?)?;
        return Some(Jp2Info {
            container: "codestream",
            width,
            height,
            components: be_u16(siz, 36)?,
        });
    }

    None
}

/// Walks the box structure down to `jp2h/ihdr`
fn find_ihdr(data: &[u8]) -> Option<(u32, u32, u16)> {
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let length = be_u32(data, offset)? as usize;
        let kind = data.get(offset + 4..offset + 8)?;
        let end = match length {
            0 => data.len(),
            1 => return None,
            _ => offset + length,
        };
        if end <= offset + 8 || end > data.len() {
            return None;
        }

        match kind {
            b"jp2h" => return find_ihdr(&data[offset + 8..end]),
            b"ihdr" => {
                let body = &data[offset + 8..end];
                return Some((be_u32(body, 4)?, be_u32(body, 0)?, be_u16(body, 8)?));
            }
            _ => offset = end,
        }
    }
    None
}

#[derive(Debug, Default)]
pub struct Jp2Analyzer;

impl Analyzer for Jp2Analyzer {
    fn format(&self) -> FileFormat {
        FileFormat::Jp2
    }

    fn analyze_file(&self, path: &Path, _context: &AnalysisContext<'_>) -> Result<Report> {
        let data = std::fs::read(path)?;
        let info = parse_jp2(&data).ok_or_else(|| malformed(path, "no JPEG 2000 image header"))?;

        Ok(base_report(FileFormat::Jp2, data.len() as u64)
            .with_attribute("container", info.container)
            .with_attribute("width", info.width)
            .with_attribute("height", info.height)
            .with_attribute("components", info.components))
    }

    fn set_text_extraction(&mut self, _mode: TextExtraction) {}
}

/// Byte order declared in a TIFF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }
}

const TAG_WIDTH: u16 = 256;
const TAG_HEIGHT: u16 = 257;
const TAG_COMPRESSION: u16 = 259;
const TAG_SOFTWARE: u16 = 305;
const TAG_DATETIME: u16 = 306;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

/// Selected fields of the first image file directory
#[derive(Debug, Default, PartialEq, Eq)]
struct TiffInfo {
    big_endian: bool,
    width: Option<u32>,
    height: Option<u32>,
    compression: Option<u32>,
    software: Option<String>,
    datetime: Option<String>,
}

fn parse_tiff(data: &[u8]) -> Option<TiffInfo> {
    let order = match data.get(..4)? {
        b"II*\0" => ByteOrder::Little,
        b"MM\0*" => ByteOrder::Big,
        _ => return None,
    };

    let mut info = TiffInfo {
        big_endian: order == ByteOrder::Big,
        ..TiffInfo::default()
    };

    let ifd = order.u32(data, 4)? as usize;
    let entries = order.u16(data, ifd)?;

    for index in 0..usize::from(entries) {
        let entry = ifd + 2 + index * 12;
        let tag = order.u16(data, entry)?;
        let kind = order.u16(data, entry + 2)?;
        let count = order.u32(data, entry + 4)? as usize;

        let number = || match kind {
            TYPE_SHORT => order.u16(data, entry + 8).map(u32::from),
            TYPE_LONG => order.u32(data, entry + 8),
            _ => None,
        };
        let ascii = || {
            if kind != TYPE_ASCII {
                return None;
            }
            let start = if count <= 4 {
                entry + 8
            } else {
                order.u32(data, entry + 8)? as usize
            };
            let raw = data.get(start..start.checked_add(count)?)?;
            let text = String::from_utf8_lossy(raw);
            Some(text.trim_end_matches('\0').trim().to_string())
        };

        match tag {
            TAG_WIDTH => info.width = number(),
            TAG_HEIGHT => info.height = number(),
            TAG_COMPRESSION => info.compression = number(),
            TAG_SOFTWARE => info.software = ascii(),
            TAG_DATETIME => info.datetime = ascii(),
            _ => {}
        }
    }

    Some(info)
}

#[derive(Debug, Default)]
pub struct TiffAnalyzer {
    validators: Validators,
}

impl Analyzer for TiffAnalyzer {
    fn format(&self) -> FileFormat {
        FileFormat::Tiff
    }

    fn analyze_file(&self, path: &Path, _context: &AnalysisContext<'_>) -> Result<Report> {
        let data = std::fs::read(path)?;
        let info = parse_tiff(&data).ok_or_else(|| malformed(path, "malformed TIFF header"))?;

        let mut report = base_report(FileFormat::Tiff, data.len() as u64)
            .with_attribute("byteorder", if info.big_endian { "big" } else { "little" });
        if let Some(width) = info.width {
            report.set_attribute("width", width);
        }
        if let Some(height) = info.height {
            report.set_attribute("height", height);
        }
        if let Some(compression) = info.compression {
            report.set_attribute("compression", compression);
        }

        let mut meta = Report::new("meta");
        if let Some(software) = info.software {
            let mut node = Report::new("software");
            node.text = software;
            meta.push_child(node);
        }
        if let Some(datetime) = info.datetime {
            let mut node = Report::new("datetime");
            node.text = datetime;
            meta.push_child(node);
        }
        report.push_child(meta);

        if let Some(validation) = self.validators.validate_tiff(path) {
            report.push_child(validation);
        }

        Ok(report)
    }

    fn set_text_extraction(&mut self, _mode: TextExtraction) {}

    fn set_validators(&mut self, validators: &Validators) {
        self.validators = validators.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jpeg_frame_and_app_segments() {
        let mut data = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x02\x00\x00\x01\x00\x01\x00\x00".to_vec();
        data.extend_from_slice(b"\xff\xe1\x00\x08Exif\x00\x00");
        // SOF0: precision 8, 480 x 640, 3 components
        data.extend_from_slice(b"\xff\xc0\x00\x11\x08\x01\xe0\x02\x80\x03");
        data.extend_from_slice(&[0u8; 9]);
        data.extend_from_slice(b"\xff\xda\x00\x02");

        let info = parse_jpeg(&data).unwrap();
        assert_eq!(
            info,
            JpegInfo {
                width: Some(640),
                height: Some(480),
                components: Some(3),
                precision: Some(8),
                jfif_version: Some((1, 2)),
                exif: true,
            }
        );
    }

    #[test]
    fn test_parse_jpeg_rejects_other_data() {
        assert!(parse_jpeg(b"%PDF-1.4").is_none());
    }

    #[test]
    fn test_parse_jp2_boxes() {
        let mut data = JP2_SIGNATURE.to_vec();
        data.extend_from_slice(b"\x00\x00\x00\x14ftypjp2 \x00\x00\x00\x00jp2 ");
        // jp2h containing ihdr: height 100, width 200, 3 components
        data.extend_from_slice(b"\x00\x00\x00\x1ejp2h");
        data.extend_from_slice(b"\x00\x00\x00\x16ihdr");
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&200u32.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(b"\x07\x07\x00\x00");

        assert_eq!(
            parse_jp2(&data),
            Some(Jp2Info {
                container: "jp2",
                width: 200,
                height: 100,
                components: 3,
            })
        );
    }

    #[test]
    fn test_parse_raw_codestream() {
        let mut data = CODESTREAM_START.to_vec();
        data.extend_from_slice(&41u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        for value in [1024u32, 768, 24, 8, 0, 0, 0, 0] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.extend_from_slice(&1u16.to_be_bytes());

        let info = parse_jp2(&data).unwrap();
        assert_eq!(info.container, "codestream");
        assert_eq!((info.width, info.height, info.components), (1000, 760, 1));
    }

    fn little_endian_tiff() -> Vec<u8> {
        let mut data = b"II*\0".to_vec();
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());

        let mut entry = |tag: u16, kind: u16, count: u32, value: u32| {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&kind.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(&value.to_le_bytes());
        };
        entry(TAG_WIDTH, TYPE_SHORT, 1, 64);
        entry(TAG_HEIGHT, TYPE_LONG, 1, 48);
        entry(TAG_COMPRESSION, TYPE_SHORT, 1, 5);
        // 8 + 2 + 4 * 12 + 4 = 62
        entry(TAG_SOFTWARE, TYPE_ASCII, 7, 62);

        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(b"GIMP 2\0");
        data
    }

    #[test]
    fn test_parse_tiff_ifd0() {
        let info = parse_tiff(&little_endian_tiff()).unwrap();
        assert_eq!(
            info,
            TiffInfo {
                big_endian: false,
                width: Some(64),
                height: Some(48),
                compression: Some(5),
                software: Some("GIMP 2".to_string()),
                datetime: None,
            }
        );
    }

    #[test]
    fn test_parse_tiff_rejects_bad_magic() {
        assert!(parse_tiff(b"II+\0\x08\x00\x00\x00").is_none());
        assert!(parse_tiff(b"II*\0\xff\xff\x00\x00").is_none());
    }
}
