//! Resume intake: raw text from PDF/DOCX files plus contact-field guesses.

pub mod fields;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use fields::{extract_email, extract_name, extract_phone, ExtractedFields};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported resume format '{0}'. Please upload PDF or DOCX.")]
    UnsupportedFormat(String),
    #[error("Failed to read resume {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse resume: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            _ => Err(ExtractionError::UnsupportedFormat(ext)),
        }
    }
}

/// What the session remembers about the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeMeta {
    pub file_name: String,
    pub size_bytes: u64,
    pub format: DocumentFormat,
    /// Hex SHA-256 of the file bytes.
    pub fingerprint: String,
}

impl ResumeMeta {
    pub fn new(file_name: impl Into<String>, format: DocumentFormat, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let fingerprint = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        Self {
            file_name: file_name.into(),
            size_bytes: bytes.len() as u64,
            format,
            fingerprint,
        }
    }
}

/// A parsed resume ready to seed a session.
#[derive(Debug, Clone)]
pub struct ParsedResume {
    pub text: String,
    pub fields: ExtractedFields,
    pub meta: ResumeMeta,
}

/// Reads a resume file, extracts its text and guesses contact fields.
pub fn parse_resume(path: &Path) -> Result<ParsedResume, ExtractionError> {
    let format = DocumentFormat::from_path(path)?;
    let bytes = fs::read(path).map_err(|source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = extract_text(&bytes, format)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ParsedResume {
        fields: ExtractedFields::from_text(&text),
        meta: ResumeMeta::new(file_name, format, &bytes),
        text,
    })
}

/// Extracts plain text from document bytes. Paragraphs end up on separate lines.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractionError> {
    match format {
        DocumentFormat::Pdf => extract_pdf_text(bytes),
        DocumentFormat::Docx => extract_docx_text(bytes),
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::Corrupt(format!("PDF text extraction failed: {e}")))?;
    // pdf-extract separates pages with form feeds.
    Ok(text.replace('\x0c', "\n"))
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Corrupt(format!("Failed to read DOCX as ZIP: {e}")))?;

    let mut doc_xml = String::new();
    {
        let mut entry = archive.by_name("word/document.xml").map_err(|_| {
            ExtractionError::Corrupt("Invalid DOCX: missing word/document.xml".into())
        })?;
        entry
            .read_to_string(&mut doc_xml)
            .map_err(|e| ExtractionError::Corrupt(format!("Failed to read document.xml: {e}")))?;
    }
    docx_xml_to_text(&doc_xml)
}

/// Collects `<w:t>` runs, one output line per `<w:p>` paragraph.
fn docx_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut output = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    if !paragraph.trim().is_empty() {
                        output.push_str(paragraph.trim_end());
                        output.push('\n');
                    }
                    paragraph.clear();
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| ExtractionError::Corrupt(format!("XML parse error: {err}")))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractionError::Corrupt(format!("XML parse error: {e}"))),
            _ => {}
        }
    }
    Ok(output)
}
