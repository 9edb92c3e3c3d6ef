//! CSV documents.
//!
//! Each row becomes a block of `header: value` lines; rows are separated by a
//! blank line. Rows shorter than the header simply omit the missing columns.

use async_trait::async_trait;

use crate::error::{GascError, Result};

use super::text::decode_text;
use super::{wrong_kind, DocumentKind, DocumentSource, SourceLoader};

/// Serializes CSV uploads into readable text.
pub struct CsvLoader;

#[async_trait]
impl SourceLoader for CsvLoader {
    async fn load(&self, source: &DocumentSource) -> Result<String> {
        match source {
            DocumentSource::Csv(bytes) => render_csv(bytes),
            other => Err(wrong_kind(DocumentKind::Csv, other)),
        }
    }
}

fn render_csv(bytes: &[u8]) -> Result<String> {
    let content = decode_text(bytes);
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| GascError::load(DocumentKind::Csv, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            GascError::load(DocumentKind::Csv, format!("row {}: {}", line + 2, e))
        })?;

        let row = record
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let header = headers.get(i).map(String::as_str).unwrap_or("");
                if header.is_empty() {
                    format!("column_{}: {}", i + 1, value)
                } else {
                    format!("{}: {}", header, value)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        rows.push(row);
    }

    Ok(rows.join("\n\n"))
}
