//! Plain-text extraction for uploaded files.
//!
//! The file extension picks the extractor:
//!
//! | Extension | Extractor |
//! |-----------|-----------|
//! | `.txt`, `.md` | UTF-8, falling back to Latin-1 |
//! | `.pdf` | `pdf-extract` |
//! | `.docx` | `word/document.xml` text runs via `quick-xml` |
//!
//! Anything else, legacy `.doc` included, is rejected with
//! [`ExtractError::UnsupportedFileType`].

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;
use tracing::warn;

use crate::config::UploadConfig;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0} (supported: .txt, .md, .pdf, .docx)")]
    UnsupportedFileType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("document appears to be empty or could not be processed")]
    Empty,
}

/// Extract plain text from `bytes`, choosing the format from `filename`.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => Ok(decode_text(bytes)),
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "" => Err(ExtractError::UnsupportedFileType(filename.to_string())),
        other => Err(ExtractError::UnsupportedFileType(format!(".{}", other))),
    }
}

/// Apply the upload text rules: reject near-empty text, truncate oversized text.
pub fn apply_upload_rules(mut text: String, upload: &UploadConfig) -> Result<String, ExtractError> {
    if text.trim().chars().count() < upload.min_chars {
        return Err(ExtractError::Empty);
    }
    if let Some((cut, _)) = text.char_indices().nth(upload.max_chars) {
        warn!(
            max_chars = upload.max_chars,
            original_bytes = text.len(),
            "document truncated"
        );
        text.truncate(cut);
    }
    Ok(text)
}

/// UTF-8 when valid, otherwise every byte maps to the Latin-1 code point.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraphs(&doc_xml)
}

/// Concatenate `<w:t>` runs; each `<w:p>` ends a line.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with(document_xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    fn upload(min_chars: usize, max_chars: usize) -> UploadConfig {
        UploadConfig {
            max_bytes: 1024,
            max_chars,
            min_chars,
        }
    }

    #[test]
    fn test_upload_rules_reject_short_text() {
        let err = apply_upload_rules("  tiny  ".to_string(), &upload(10, 100)).unwrap_err();
        assert!(matches!(err, ExtractError::Empty));
    }

    #[test]
    fn test_upload_rules_truncate_on_char_boundary() {
        let out = apply_upload_rules("é".repeat(30), &upload(1, 12)).unwrap();
        assert_eq!(out, "é".repeat(12));
    }

    #[test]
    fn test_upload_rules_keep_text_within_limit() {
        let text = "Inertia is resistance to change.".to_string();
        assert_eq!(apply_upload_rules(text.clone(), &upload(10, 100)).unwrap(), text);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let text = extract_text("notes.txt", "Forces & motion ✓".as_bytes()).unwrap();
        assert_eq!(text, "Forces & motion ✓");
    }

    #[test]
    fn test_markdown_extension_case_insensitive() {
        assert_eq!(extract_text("README.MD", b"# Title").unwrap(), "# Title");
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_latin1() {
        let text = extract_text("old.txt", b"caf\xe9 na\xefve").unwrap();
        assert_eq!(text, "café naïve");
    }

    #[test]
    fn test_unsupported_extensions() {
        for name in ["legacy.doc", "slides.pptx", "image.png"] {
            let err = extract_text(name, b"data").unwrap_err();
            assert!(matches!(err, ExtractError::UnsupportedFileType(_)), "{}", name);
        }
        assert!(matches!(
            extract_text("no_extension", b"data"),
            Err(ExtractError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_text("notes.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = extract_text("notes.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Newton's First Law</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Objects at rest </w:t></w:r><w:r><w:t>stay at rest.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_text("physics.docx", &docx_with(xml)).unwrap();
        assert_eq!(text, "Newton's First Law\nObjects at rest stay at rest.");
    }

    #[test]
    fn test_docx_without_document_xml() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text("empty.docx", &buf).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
