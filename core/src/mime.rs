//! MIME type guessing for file uploads: magic numbers first, then the file
//! extension, then `application/octet-stream`.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"<?xml", "application/xml"),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
];

/// Guess the MIME type of a file from its leading bytes and its name.
pub fn guess(path: &Path, content: &[u8]) -> &'static str {
    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| content.starts_with(magic)) {
        return *mime;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| EXTENSIONS.iter().find(|(known, _)| *known == ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_number_wins_over_extension() {
        assert_eq!(guess(Path::new("image.txt"), b"\x89PNG\r\n\x1a\nrest"), "image/png");
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(guess(Path::new("notes.TXT"), b"hello"), "text/plain");
    }

    #[test]
    fn unknown_is_octet_stream() {
        assert_eq!(guess(Path::new("blob.bin"), b"\x00\x01"), OCTET_STREAM);
        assert_eq!(guess(Path::new("noext"), b""), OCTET_STREAM);
    }
}
