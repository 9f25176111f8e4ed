//! Paragraph extraction from source documents.
//!
//! The structural parser works on a sequence of non-empty, trimmed
//! paragraphs. For `.docx` files each `<w:p>` element in
//! `word/document.xml` becomes one paragraph; for `.txt` files each line does.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes to read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure for a single source file. The ingest pipeline logs it
/// and moves on to the next file.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// File extensions the corpus loader accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["docx", "txt"];

/// Read a source document and return its non-empty paragraphs, trimmed.
pub fn read_paragraphs(path: &Path) -> Result<Vec<String>, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "docx" => {
            let bytes = std::fs::read(path)?;
            docx_paragraphs(&bytes)
        }
        "txt" => {
            let text = std::fs::read_to_string(path)?;
            Ok(text_paragraphs(&text))
        }
        _ => Err(ExtractError::UnsupportedFileType(
            path.display().to_string(),
        )),
    }
}

/// Split plain text into trimmed, non-empty lines.
pub fn text_paragraphs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract paragraphs from the bytes of a `.docx` file.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
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

    extract_w_p_paragraphs(&doc_xml)
}

fn extract_w_p_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    // Runs split words mid-sentence ("Điều " + "5"), so whitespace inside <w:t> matters.
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        paragraphs.push(trimmed.to_string());
                    }
                    current.clear();
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" | b"br" | b"cr" => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}
