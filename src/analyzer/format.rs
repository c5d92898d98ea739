//! File format identification
//!
//! Formats are recognized by their content signature first. Only when the
//! signature is unknown does the file extension decide.

use crate::url::file_extension;
use crate::Result;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Number of leading bytes inspected for signatures
const SIGNATURE_LENGTH: usize = 16;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const JP2_BOX_MAGIC: &[u8] = b"\x00\x00\x00\x0cjP  \r\n\x87\n";
const JP2_CODESTREAM_MAGIC: &[u8] = b"\xff\x4f\xff\x51";
const OLE_MAGIC: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";
const ODF_MIMETYPE_PREFIX: &str = "application/vnd.oasis.opendocument.";

/// Format families that have an analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileFormat {
    /// OpenDocument (odt, ods, odp, ...)
    Odf,
    /// Office Open XML (docx, xlsx, pptx, ...)
    OpenXml,
    /// Plain ZIP archive
    Zip,
    Pdf,
    /// OLE2 compound binary (doc, xls, ppt)
    CompoundBinary,
    Jpeg,
    /// JPEG 2000
    Jp2,
    Tiff,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Odf => "odf",
            Self::OpenXml => "openxml",
            Self::Zip => "zip",
            Self::Pdf => "pdf",
            Self::CompoundBinary => "compoundbinary",
            Self::Jpeg => "jpeg",
            Self::Jp2 => "jp2",
            Self::Tiff => "tiff",
        }
    }

    /// Guesses the format from a file name's extension
    pub fn from_extension(filename: &str) -> Option<FileFormat> {
        match classify_extension(filename)? {
            Classification::Format(format) => Some(format),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-file compression wrappers, unpacked with an external tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Command line tool that decompresses to stdout with `-dc`
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Result of identifying a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Format(FileFormat),
    Compressed(Compression),
    Unknown,
}

/// What the leading bytes say about a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signature {
    Zip,
    Format(FileFormat),
    Compressed(Compression),
}

fn match_signature(head: &[u8]) -> Option<Signature> {
    let signature = if head.starts_with(ZIP_MAGIC) {
        Signature::Zip
    } else if head.starts_with(b"%PDF-") {
        Signature::Format(FileFormat::Pdf)
    } else if head.starts_with(b"\xff\xd8\xff") {
        Signature::Format(FileFormat::Jpeg)
    } else if head.starts_with(JP2_BOX_MAGIC) || head.starts_with(JP2_CODESTREAM_MAGIC) {
        Signature::Format(FileFormat::Jp2)
    } else if head.starts_with(b"II*\x00") || head.starts_with(b"MM\x00*") {
        Signature::Format(FileFormat::Tiff)
    } else if head.starts_with(OLE_MAGIC) {
        Signature::Format(FileFormat::CompoundBinary)
    } else if head.starts_with(b"\x1f\x8b") {
        Signature::Compressed(Compression::Gzip)
    } else if head.starts_with(b"BZh") {
        Signature::Compressed(Compression::Bzip2)
    } else if head.starts_with(b"\xfd7zXZ\x00") {
        Signature::Compressed(Compression::Xz)
    } else {
        return None;
    };

    Some(signature)
}

/// Identifies a file on disk
///
/// ZIP archives are opened to tell OpenDocument (`meta.xml` or an OpenDocument
/// `mimetype` entry) from Office Open XML (`[Content_Types].xml`). A ZIP without
/// either is only accepted as plain ZIP if its name ends in `.zip`.
pub fn classify_file(path: &Path) -> Result<Classification> {
    let mut head = Vec::with_capacity(SIGNATURE_LENGTH);
    File::open(path)?
        .take(SIGNATURE_LENGTH as u64)
        .read_to_end(&mut head)?;

    let filename = path.to_string_lossy();

    let classification = match match_signature(&head) {
        Some(Signature::Format(format)) => Classification::Format(format),
        Some(Signature::Compressed(compression)) => Classification::Compressed(compression),
        Some(Signature::Zip) => classify_zip(path, &filename),
        None => classify_extension(&filename).unwrap_or(Classification::Unknown),
    };

    tracing::trace!("{} classified as {:?}", filename, classification);
    Ok(classification)
}

fn classify_zip(path: &Path, filename: &str) -> Classification {
    let archive = File::open(path)
        .map_err(zip::result::ZipError::from)
        .and_then(ZipArchive::new);

    let mut archive = match archive {
        Ok(archive) => archive,
        Err(e) => {
            tracing::debug!("{} has a ZIP signature but cannot be opened: {}", filename, e);
            return classify_extension(filename).unwrap_or(Classification::Unknown);
        }
    };

    if archive.by_name("meta.xml").is_ok() || odf_mimetype(&mut archive).is_some() {
        return Classification::Format(FileFormat::Odf);
    }

    if archive.by_name("[Content_Types].xml").is_ok() {
        return Classification::Format(FileFormat::OpenXml);
    }

    if file_extension(filename).as_deref() == Some("zip") {
        Classification::Format(FileFormat::Zip)
    } else {
        Classification::Unknown
    }
}

/// Reads the `mimetype` entry if it names an OpenDocument type
pub(crate) fn odf_mimetype<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    let mut entry = archive.by_name("mimetype").ok()?;
    let mut mimetype = String::new();
    entry.by_ref().take(256).read_to_string(&mut mimetype).ok()?;

    let mimetype = mimetype.trim().to_string();
    mimetype.starts_with(ODF_MIMETYPE_PREFIX).then_some(mimetype)
}

fn classify_extension(filename: &str) -> Option<Classification> {
    let classification = match file_extension(filename)?.as_str() {
        "odt" | "ods" | "odp" | "odg" | "odf" | "ott" | "ots" | "otp" => {
            Classification::Format(FileFormat::Odf)
        }
        "docx" | "docm" | "xlsx" | "xlsm" | "pptx" | "pptm" | "dotx" => {
            Classification::Format(FileFormat::OpenXml)
        }
        "zip" => Classification::Format(FileFormat::Zip),
        "pdf" => Classification::Format(FileFormat::Pdf),
        "doc" | "xls" | "ppt" | "dot" => Classification::Format(FileFormat::CompoundBinary),
        "jpg" | "jpeg" | "jpe" | "jfif" => Classification::Format(FileFormat::Jpeg),
        "jp2" | "jpx" | "jpf" | "j2k" => Classification::Format(FileFormat::Jp2),
        "tif" | "tiff" => Classification::Format(FileFormat::Tiff),
        "gz" => Classification::Compressed(Compression::Gzip),
        "bz2" => Classification::Compressed(Compression::Bzip2),
        "xz" => Classification::Compressed(Compression::Xz),
        _ => return None,
    };

    Some(classification)
}

/// File suffix (without dot) implied by a payload's leading bytes
///
/// Generic ZIP and compound binary payloads yield `None`: their real type is
/// better told by the Content-Type or the URL.
pub fn suffix_for_content(head: &[u8]) -> Option<&'static str> {
    match match_signature(head)? {
        Signature::Format(FileFormat::Pdf) => Some("pdf"),
        Signature::Format(FileFormat::Jpeg) => Some("jpg"),
        Signature::Format(FileFormat::Jp2) => Some("jp2"),
        Signature::Format(FileFormat::Tiff) => Some("tif"),
        Signature::Compressed(compression) => Some(compression.extension()),
        _ => None,
    }
}

/// Returns true if the payload starts with a ZIP local file header
pub fn is_zip_content(head: &[u8]) -> bool {
    head.starts_with(ZIP_MAGIC)
}
