//! Plain-text documents.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

use super::{wrong_kind, DocumentKind, DocumentSource, SourceLoader};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decodes uploaded text files.
///
/// Invalid UTF-8 is replaced rather than rejected, so legacy encodings still
/// produce usable text.
pub struct TextLoader;

#[async_trait]
impl SourceLoader for TextLoader {
    async fn load(&self, source: &DocumentSource) -> Result<String> {
        match source {
            DocumentSource::Text(bytes) => Ok(decode_text(bytes)),
            other => Err(wrong_kind(DocumentKind::Text, other)),
        }
    }
}

/// UTF-8 decode with BOM stripping and lossy fallback.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(valid_up_to = e.valid_up_to(), "Text document is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
