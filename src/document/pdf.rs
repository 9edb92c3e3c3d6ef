//! PDF documents.
//!
//! Text is extracted page by page with lopdf and joined in page order.
//! Requires the `loader-pdf` feature (on by default).

use async_trait::async_trait;

use crate::error::{GascError, Result};

use super::{wrong_kind, DocumentKind, DocumentSource, SourceLoader};

/// Extracts text from uploaded PDFs.
pub struct PdfLoader;

#[async_trait]
impl SourceLoader for PdfLoader {
    async fn load(&self, source: &DocumentSource) -> Result<String> {
        match source {
            DocumentSource::Pdf(bytes) => {
                let bytes = bytes.clone();
                tokio::task::spawn_blocking(move || extract_text(&bytes))
                    .await
                    .map_err(|e| GascError::load(DocumentKind::Pdf, format!("extraction task failed: {}", e)))?
            }
            other => Err(wrong_kind(DocumentKind::Pdf, other)),
        }
    }
}

#[cfg(feature = "loader-pdf")]
fn extract_text(bytes: &[u8]) -> Result<String> {
    use super::site::normalize_lines;

    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| GascError::load(DocumentKind::Pdf, e.to_string()))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        let text = document.extract_text(&[*page_number]).map_err(|e| {
            GascError::load(DocumentKind::Pdf, format!("page {}: {}", page_number, e))
        })?;
        let text = normalize_lines(&text);
        if !text.is_empty() {
            pages.push(text);
        }
    }

    Ok(pages.join("\n\n"))
}

#[cfg(not(feature = "loader-pdf"))]
fn extract_text(_bytes: &[u8]) -> Result<String> {
    Err(GascError::load(
        DocumentKind::Pdf,
        "built without PDF support; rebuild with --features loader-pdf",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_garbage() {
        let err = PdfLoader
            .load(&DocumentSource::Pdf(b"definitely not a pdf".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, GascError::Load { kind: DocumentKind::Pdf, .. }));
    }

    #[tokio::test]
    async fn test_rejects_other_kinds() {
        let err = PdfLoader.load(&DocumentSource::Text(vec![])).await.unwrap_err();
        assert!(err.to_string().contains("Text source"));
    }

    #[cfg(feature = "loader-pdf")]
    #[tokio::test]
    async fn test_extracts_generated_pdf() {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal("Version 2.0 release notes")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let text = PdfLoader.load(&DocumentSource::Pdf(bytes)).await.unwrap();
        assert!(text.contains("Version 2.0 release notes"), "got: {:?}", text);
    }
}
