// Clause extraction
// Turns PDF, DOCX and email files into ordered, addressable text clauses

mod docx;


use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::{LexiqError, Result};

/// A contiguous span of text taken from one source document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clause {
    pub text: String,
    /// Unique within a file, derived from the file name and the clause's location
    pub clause_id: String,
    /// 1-based page number, only for page-oriented formats
    pub page: Option<u32>,
    /// Base name of the source file
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Eml,
}

impl DocumentFormat {
    /// Detect the format from the lowercased file extension
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "eml" => Ok(Self::Eml),
            _ if extension.is_empty() => Err(LexiqError::UnsupportedFormat(
                "(no extension)".to_string(),
            )),
            _ => Err(LexiqError::UnsupportedFormat(format!(".{}", extension))),
        }
    }
}

impl fmt::Display for DocumentFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DocumentFormat::Pdf => write!(f, "PDF"),
            DocumentFormat::Docx => write!(f, "DOCX"),
            DocumentFormat::Eml => write!(f, "EML"),
        }
    }
}

/// Read the file at `path` and extract its clauses in document order
#[inline]
pub fn extract_clauses(path: &Path) -> Result<Vec<Clause>> {
    let format = DocumentFormat::from_path(path)?;
    let file_name = file_name(path);

    let bytes = std::fs::read(path).map_err(|e| {
        LexiqError::Extraction(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let clauses = extract_clauses_from_bytes(&file_name, format, &bytes)?;
    debug!(
        "Extracted {} clauses from {} ({})",
        clauses.len(),
        file_name,
        format
    );
    Ok(clauses)
}

/// Extract clauses from an in-memory document named `file_name`
#[inline]
pub fn extract_clauses_from_bytes(
    file_name: &str,
    format: DocumentFormat,
    bytes: &[u8],
) -> Result<Vec<Clause>> {
    match format {
        DocumentFormat::Pdf => extract_pdf(file_name, bytes),
        DocumentFormat::Docx => docx::extract_docx(file_name, bytes),
        DocumentFormat::Eml => extract_eml(file_name, bytes),
    }
}

/// Build PDF clauses from per-page text, pages numbered from 1.
///
/// Block indices count every blank-line separated segment of a page, so
/// skipping blank blocks leaves gaps in the numbering. Line breaks around
/// the page text are not blocks.
#[inline]
pub fn clauses_from_pages(file_name: &str, pages: &[String]) -> Vec<Clause> {
    let mut clauses = Vec::new();

    for (page, text) in (1u32..).zip(pages) {
        let text = text.replace("\r\n", "\n");
        for (block, segment) in blocks(text.trim_matches('\n')).iter().enumerate() {
            if let Some(text) = non_blank(segment) {
                clauses.push(Clause {
                    text,
                    clause_id: format!("{}_p{}_b{}", file_name, page, block),
                    page: Some(page),
                    file: file_name.to_string(),
                });
            }
        }
    }

    clauses
}

/// Build email clauses from the message body
#[inline]
pub fn clauses_from_body(file_name: &str, body: &str) -> Vec<Clause> {
    blocks(body)
        .iter()
        .enumerate()
        .filter_map(|(index, segment)| {
            non_blank(segment).map(|text| Clause {
                text,
                clause_id: format!("{}_eml{}", file_name, index),
                page: None,
                file: file_name.to_string(),
            })
        })
        .collect()
}

fn extract_pdf(file_name: &str, bytes: &[u8]) -> Result<Vec<Clause>> {
    // pdf-extract panics on some structurally valid documents
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|panic| {
            LexiqError::Extraction(format!(
                "PDF extraction aborted for {}: {}",
                file_name,
                panic_message(&*panic)
            ))
        })?
        .map_err(|e| LexiqError::Extraction(format!("PDF extraction error: {}", e)))?;

    let clauses = clauses_from_pages(file_name, &pages);
    if clauses.is_empty() {
        warn!(
            "{} contains no extractable text, it may be image-based or encrypted",
            file_name
        );
    }
    Ok(clauses)
}

fn extract_eml(file_name: &str, bytes: &[u8]) -> Result<Vec<Clause>> {
    let message = MessageParser::default()
        .parse(bytes)
        .ok_or_else(|| LexiqError::Extraction(format!("Failed to parse email {}", file_name)))?;

    let parts: Vec<String> = (0..message.text_body_count())
        .filter_map(|index| message.body_text(index))
        .map(|text| text.into_owned())
        .collect();

    Ok(clauses_from_body(file_name, &parts.join("\n\n")))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Split text on blank-line boundaries after normalizing line endings
fn blocks(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::to_string)
        .collect()
}

fn non_blank(segment: &str) -> Option<String> {
    let trimmed = segment.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
