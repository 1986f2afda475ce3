//! Files offered by the picker or a drop

use std::path::Path;

pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), bytes }
    }

    /// Build from a file already read off disk, guessing its MIME type
    pub fn from_path(path: &Path, bytes: Vec<u8>) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_owned());
        let mime_type = sniff_mime(path, &bytes).to_owned();

        Self { name, mime_type, bytes }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(PDF_MIME)
    }
}

/// MIME type from magic bytes, falling back to the file extension
pub fn sniff_mime(path: &Path, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF-") {
        return PDF_MIME;
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }

    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => PDF_MIME,
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
