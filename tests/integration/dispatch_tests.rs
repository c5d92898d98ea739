//! Integration tests for the type dispatcher and the format analyzers

use docscan::config::TextExtraction;
use docscan::output::Report;
use docscan::Multiplexer;
use std::io::Write;
use std::process::Command;
use tempfile::{Builder, TempPath};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn write_file(suffix: &str, content: &[u8]) -> TempPath {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content).unwrap();
    file.into_temp_path()
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        // ODF requires the mimetype entry to be stored uncompressed
        let options = if *name == "mimetype" {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
        };
        writer.start_file(name.to_string(), options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn text_of<'a>(report: &'a Report, path: &[&str]) -> Option<&'a str> {
    let mut node = report;
    for name in path {
        node = node.child(name)?;
    }
    Some(node.text.as_str())
}

const JPEG: &[u8] =
    b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00\xff\xd9";

#[test]
fn test_odf_document() {
    let meta = br#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-meta xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" office:version="1.3">
  <office:meta>
    <meta:generator>LibreOffice/7.6.4.1$Linux_X86_64</meta:generator>
    <dc:title>Budget &amp; Plan</dc:title>
    <meta:creation-date>2024-02-01T09:30:00.123456789</meta:creation-date>
  </office:meta>
</office:document-meta>"#;
    let content = br#"<office:document-content><office:body><office:text>
<text:p>First paragraph.</text:p><text:p>Second <text:span>one</text:span>.</text:p>
</office:text></office:body></office:document-content>"#;

    let file = write_file(
        ".odt",
        &build_zip(&[
            ("mimetype", b"application/vnd.oasis.opendocument.text"),
            ("meta.xml", meta),
            ("content.xml", content),
        ]),
    );

    let mut multiplexer = Multiplexer::new();
    multiplexer.set_text_extraction(TextExtraction::Full);
    let report = multiplexer.analyze_file(&file).unwrap().expect("ODF recognized");

    assert_eq!(report.attribute("format"), Some("odf"));
    assert_eq!(
        report.attribute("mimetype"),
        Some("application/vnd.oasis.opendocument.text")
    );
    assert_eq!(report.attribute("version"), Some("1.3"));
    assert_eq!(
        text_of(&report, &["meta", "generator"]),
        Some("LibreOffice/7.6.4.1$Linux_X86_64")
    );
    assert_eq!(text_of(&report, &["meta", "title"]), Some("Budget & Plan"));

    let created = report.child("meta").and_then(|meta| meta.child("date")).unwrap();
    assert_eq!(created.attribute("base"), Some("creationdate"));
    assert_eq!(created.attribute("year"), Some("2024"));

    let text = report.child("text").expect("text extracted");
    assert!(text.text.contains("First paragraph."));
    assert!(text.text.contains("Second one"));
}

#[test]
fn test_openxml_document() {
    let content_types = br#"<Types><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
    let core = br#"<cp:coreProperties><dc:creator>Ada</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">2023-05-06T07:08:09Z</dcterms:created></cp:coreProperties>"#;
    let app = br#"<Properties><Application>Microsoft Office Word</Application><AppVersion>16.0000</AppVersion></Properties>"#;
    let document = br#"<w:document><w:body><w:p><w:r><w:t>Hello docx</w:t></w:r></w:p></w:body></w:document>"#;

    // Misleading extension: the content decides
    let file = write_file(
        ".bin",
        &build_zip(&[
            ("[Content_Types].xml", content_types),
            ("docProps/core.xml", core),
            ("docProps/app.xml", app),
            ("word/document.xml", document),
        ]),
    );

    let mut multiplexer = Multiplexer::new();
    multiplexer.set_text_extraction(TextExtraction::Length);
    let report = multiplexer.analyze_file(&file).unwrap().expect("OOXML recognized");

    assert_eq!(report.attribute("format"), Some("openxml"));
    assert_eq!(
        report.attribute("mimetype"),
        Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
    );
    assert_eq!(text_of(&report, &["meta", "creator"]), Some("Ada"));
    assert_eq!(
        text_of(&report, &["meta", "generator"]),
        Some("Microsoft Office Word 16.0000")
    );

    let text = report.child("text").expect("text length reported");
    assert_eq!(text.attribute("length"), Some("10"));
    assert!(text.text.is_empty());
}

#[test]
fn test_jpeg_signature_beats_extension() {
    let file = write_file(".txt", JPEG);
    let report = Multiplexer::new().analyze_file(&file).unwrap().unwrap();

    assert_eq!(report.attribute("format"), Some("jpeg"));
    assert_eq!(report.attribute("jfif"), Some("1.1"));
}

#[test]
fn test_zip_without_known_structure_is_skipped() {
    let file = write_file(".dat", &build_zip(&[("readme.txt", b"hello")]));
    assert!(Multiplexer::new().analyze_file(&file).unwrap().is_none());
}

#[test]
fn test_zip_archive_with_embedded_files() {
    let file = write_file(
        ".zip",
        &build_zip(&[("notes.txt", b"plain"), ("scans/photo.jpg", JPEG)]),
    );

    let mut multiplexer = Multiplexer::new();
    multiplexer.set_analyze_embedded_files(true);
    let report = multiplexer.analyze_file(&file).unwrap().unwrap();

    assert_eq!(report.attribute("format"), Some("zip"));
    assert_eq!(report.attribute("entries"), Some("2"));

    let embedded: Vec<&Report> = report
        .children
        .iter()
        .filter(|child| child.name == "embeddedfile")
        .collect();
    assert_eq!(embedded.len(), 2);

    assert_eq!(embedded[0].attribute("name"), Some("notes.txt"));
    assert_eq!(embedded[0].attribute("status"), Some("unknown"));

    assert_eq!(embedded[1].attribute("name"), Some("scans/photo.jpg"));
    assert_eq!(embedded[1].attribute("status"), Some("ok"));
    let nested = embedded[1].child("fileanalysis").unwrap();
    assert_eq!(nested.attribute("format"), Some("jpeg"));
    assert_eq!(nested.attribute("depth"), Some("1"));
}

#[test]
fn test_embedded_entry_limit() {
    let file = write_file(
        ".zip",
        &build_zip(&[("a.jpg", JPEG), ("b.jpg", JPEG), ("c.jpg", JPEG)]),
    );

    let mut multiplexer = Multiplexer::new();
    multiplexer.set_analyze_embedded_files(true);
    multiplexer.set_embedded_limits(8, 2);
    let report = multiplexer.analyze_file(&file).unwrap().unwrap();

    let embedded = report
        .children
        .iter()
        .filter(|child| child.name == "embeddedfile")
        .count();
    assert_eq!(embedded, 2);
}

#[test]
fn test_temporary_file_removed_when_analysis_fails() {
    // Claims to be a PDF by name but has no header
    let path = write_file(".pdf", b"garbage").keep().unwrap();

    let result = Multiplexer::new().analyze_temporary_file(path.clone());
    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn test_temporary_file_removed_when_format_unknown() {
    let path = write_file(".bin", b"nothing recognizable").keep().unwrap();

    let result = Multiplexer::new().analyze_temporary_file(path.clone());
    assert!(result.unwrap().is_none());
    assert!(!path.exists());
}

#[test]
fn test_gzipped_pdf_is_unpacked_and_cleaned_up() {
    let pdf = write_file(".pdf", b"%PDF-1.7\n1 0 obj << /Producer (Scanner 3000) >> endobj\n%%EOF");
    let output = Command::new("gzip")
        .arg("-c")
        .arg(&*pdf)
        .output()
        .expect("gzip available");
    assert!(output.status.success());

    let scratch = tempfile::tempdir().unwrap();
    let path = write_file(".pdf.gz", &output.stdout).keep().unwrap();

    let mut multiplexer = Multiplexer::new();
    multiplexer.set_temp_dir(scratch.path());
    let report = multiplexer
        .analyze_temporary_file(path.clone())
        .unwrap()
        .expect("gzip wrapper recognized");

    assert_eq!(report.attribute("format"), Some("pdf"));
    assert_eq!(report.attribute("compression"), Some("gz"));
    assert_eq!(report.attribute("version"), Some("1.7"));
    assert_eq!(report.attribute("filename"), Some(path.to_str().unwrap()));

    // Neither the download nor the unpacked copy survive the analysis
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}
