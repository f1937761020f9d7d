
use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Scalar document-level metadata value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub file_name: String,
    /// 1-based page number, PDF only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Document info entries such as `Title` or `Author`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetadataValue>,
}

/// Text of one page (PDF) or one whole file (plain text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub metadata: SegmentMetadata,
}

/// Extract segments from `path` using the extractor registered for `extension`
#[inline]
pub fn extract_segments(path: &Path, file_name: &str, extension: &str) -> Result<Vec<Segment>> {
    let segments = match extension {
        ".txt" => extract_text_file(path, file_name)?,
        ".pdf" => extract_pdf(path, file_name)?,
        other => anyhow::bail!("No extractor for extension '{}'", other),
    };

    debug!("Extracted {} segments from {}", segments.len(), file_name);
    Ok(segments)
}

/// Whole file as a single segment; an empty file yields none
#[inline]
pub fn extract_text_file(path: &Path, file_name: &str) -> Result<Vec<Segment>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Segment {
        text,
        metadata: SegmentMetadata {
            file_name: file_name.to_string(),
            ..SegmentMetadata::default()
        },
    }])
}

/// One segment per page with extractable text
#[inline]
pub fn extract_pdf(path: &Path, file_name: &str) -> Result<Vec<Segment>> {
    let document = Document::load(path)
        .with_context(|| format!("Failed to parse PDF {}", path.display()))?;

    let pages = document.get_pages();
    let total_pages = u32::try_from(pages.len()).unwrap_or(u32::MAX);
    let extra = info_metadata(&document);

    let mut segments = Vec::new();
    for &page_number in pages.keys() {
        let text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Failed to extract text from page {} of {}: {}",
                    page_number, file_name, e
                );
                continue;
            }
        };

        if text.trim().is_empty() {
            debug!("Skipping page {} of {}: no text", page_number, file_name);
            continue;
        }

        segments.push(Segment {
            text,
            metadata: SegmentMetadata {
                file_name: file_name.to_string(),
                page_number: Some(page_number),
                total_pages: Some(total_pages),
                extra: extra.clone(),
            },
        });
    }

    Ok(segments)
}

/// Scalar entries of the trailer's `Info` dictionary
fn info_metadata(document: &Document) -> BTreeMap<String, MetadataValue> {
    let Some(info) = info_dictionary(document) else {
        return BTreeMap::new();
    };

    info.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Object::String(bytes, _) => MetadataValue::Text(decode_pdf_string(bytes)),
                Object::Integer(number) => MetadataValue::Integer(*number),
                _ => return None,
            };
            Some((String::from_utf8_lossy(key).into_owned(), value))
        })
        .collect()
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dictionary) => Some(dictionary),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, otherwise byte-per-char
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
