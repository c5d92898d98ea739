//! Mimetype guessing from filenames and suffix selection for mimetypes

/// Guesses a mimetype from a filename's extension
///
/// For example, `test.html` or `test.htm` yield `text/html`.
/// Returns `None` if the extension is missing or unknown.
///
/// # Examples
///
/// ```
/// use docscan::url::guess_mimetype;
///
/// assert_eq!(guess_mimetype("Report.PDF"), Some("application/pdf"));
/// assert_eq!(guess_mimetype("archive.tar"), None);
/// ```
pub fn guess_mimetype(filename: &str) -> Option<&'static str> {
    let extension = file_extension(filename)?;

    let mimetype = match extension.as_str() {
        "htm" | "html" => "text/html",
        "pdf" => "application/pdf",
        "xml" => "application/xml",
        "jpg" | "jpeg" | "jpe" | "jfif" => "image/jpeg",
        "jp2" | "jpf" | "jpx" => "image/jp2",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        _ => {
            tracing::debug!("Cannot guess mimetype for filename {}", filename);
            return None;
        }
    };

    Some(mimetype)
}

/// Returns the file suffix (without dot) used for a mimetype
///
/// Parameters such as `; charset=utf-8` are ignored. Unknown mimetypes map to `data`.
pub fn extension_for_mimetype(mimetype: &str) -> &'static str {
    let essence = mimetype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    match essence.as_str() {
        "text/html" | "application/xhtml+xml" => "html",
        "application/pdf" => "pdf",
        "application/xml" | "text/xml" => "xml",
        "image/jpeg" => "jpeg",
        "image/jp2" => "jp2",
        "image/png" => "png",
        "image/tiff" => "tiff",
        "application/zip" => "zip",
        "application/msword" => "doc",
        "application/vnd.oasis.opendocument.text" => "odt",
        "application/vnd.oasis.opendocument.spreadsheet" => "ods",
        "application/vnd.oasis.opendocument.presentation" => "odp",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "" => "data",
        other => {
            tracing::debug!("Don't know file extension for mimetype {}", other);
            "data"
        }
    }
}

/// Returns the lowercase extension of the last path component, at most four characters long
pub fn file_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, extension) = name.rsplit_once('.')?;

    let valid = !stem.is_empty()
        && (1..=4).contains(&extension.len())
        && extension.chars().all(|c| c.is_ascii_alphanumeric());

    valid.then(|| extension.to_ascii_lowercase())
}
