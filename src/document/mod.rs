//! Document sources and loaders
//!
//! A session is grounded on exactly one document. [`DocumentSource`] names
//! it (a URL or raw file bytes); [`DocumentLoader`] turns it into plain text
//! through a fixed table mapping each [`DocumentKind`] to a loader. Adding a
//! format means registering another [`SourceLoader`], not adding a branch.

mod pdf;
mod site;
mod tabular;
mod text;
mod video;

pub use pdf::PdfLoader;
pub use site::SiteLoader;
pub use tabular::CsvLoader;
pub use text::TextLoader;
pub use video::VideoLoader;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::config::LoaderConfig;
use crate::error::{GascError, Result};

/// Tag of a [`DocumentSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Site,
    Video,
    Pdf,
    Csv,
    Text,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Site,
        DocumentKind::Video,
        DocumentKind::Pdf,
        DocumentKind::Csv,
        DocumentKind::Text,
    ];

    /// Whether the source reference is a URL rather than a file.
    pub fn is_remote(&self) -> bool {
        matches!(self, DocumentKind::Site | DocumentKind::Video)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Site => "Site",
            DocumentKind::Video => "Video",
            DocumentKind::Pdf => "Pdf",
            DocumentKind::Csv => "Csv",
            DocumentKind::Text => "Text",
        };
        f.write_str(name)
    }
}

impl FromStr for DocumentKind {
    type Err = GascError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "site" | "web" | "url" => Ok(DocumentKind::Site),
            "video" | "youtube" => Ok(DocumentKind::Video),
            "pdf" => Ok(DocumentKind::Pdf),
            "csv" => Ok(DocumentKind::Csv),
            "txt" | "text" => Ok(DocumentKind::Text),
            _ => Err(GascError::UnknownDocumentKind(s.to_string())),
        }
    }
}

/// The single document a session is grounded on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Site(String),
    Video(String),
    Pdf(Vec<u8>),
    Csv(Vec<u8>),
    Text(Vec<u8>),
}

impl DocumentSource {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentSource::Site(_) => DocumentKind::Site,
            DocumentSource::Video(_) => DocumentKind::Video,
            DocumentSource::Pdf(_) => DocumentKind::Pdf,
            DocumentSource::Csv(_) => DocumentKind::Csv,
            DocumentSource::Text(_) => DocumentKind::Text,
        }
    }

    /// Build a source from a reference: a URL for remote kinds, a file path
    /// otherwise (the file is read eagerly).
    pub async fn open(kind: DocumentKind, reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(GascError::load(kind, "no source given"));
        }

        if kind.is_remote() {
            url::Url::parse(reference)
                .map_err(|e| GascError::load(kind, format!("invalid URL '{}': {}", reference, e)))?;
            return Ok(match kind {
                DocumentKind::Video => DocumentSource::Video(reference.to_string()),
                _ => DocumentSource::Site(reference.to_string()),
            });
        }

        let bytes = tokio::fs::read(Path::new(reference))
            .await
            .map_err(|e| GascError::load(kind, format!("cannot read {}: {}", reference, e)))?;
        Ok(Self::from_bytes(kind, bytes))
    }

    /// Wrap uploaded bytes. Remote kinds interpret the bytes as a URL.
    pub fn from_bytes(kind: DocumentKind, bytes: Vec<u8>) -> Self {
        match kind {
            DocumentKind::Pdf => DocumentSource::Pdf(bytes),
            DocumentKind::Csv => DocumentSource::Csv(bytes),
            DocumentKind::Text => DocumentSource::Text(bytes),
            DocumentKind::Site => {
                DocumentSource::Site(String::from_utf8_lossy(&bytes).trim().to_string())
            }
            DocumentKind::Video => {
                DocumentSource::Video(String::from_utf8_lossy(&bytes).trim().to_string())
            }
        }
    }

    /// Short description for logs (never the document bytes).
    pub fn describe(&self) -> String {
        match self {
            DocumentSource::Site(url) | DocumentSource::Video(url) => url.clone(),
            DocumentSource::Pdf(b) | DocumentSource::Csv(b) | DocumentSource::Text(b) => {
                format!("{} bytes", b.len())
            }
        }
    }
}

/// Format-specific text extraction.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Extract normalized text from `source`.
    ///
    /// Loaders are registered per kind and only receive sources of that kind.
    async fn load(&self, source: &DocumentSource) -> Result<String>;
}

/// Dispatch table from document kind to loader.
#[derive(Clone, Default)]
pub struct DocumentLoader {
    loaders: HashMap<DocumentKind, Arc<dyn SourceLoader>>,
}

impl DocumentLoader {
    /// Empty table; every load fails until loaders are registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the built-in loaders for every kind.
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut loader = Self::empty();
        loader.register(DocumentKind::Site, Arc::new(SiteLoader::new(client.clone())));
        loader.register(
            DocumentKind::Video,
            Arc::new(VideoLoader::new(client, config.transcript_languages.clone())),
        );
        loader.register(DocumentKind::Pdf, Arc::new(PdfLoader));
        loader.register(DocumentKind::Csv, Arc::new(CsvLoader));
        loader.register(DocumentKind::Text, Arc::new(TextLoader));
        Ok(loader)
    }

    /// Register (or replace) the loader for `kind`.
    pub fn register(&mut self, kind: DocumentKind, loader: Arc<dyn SourceLoader>) {
        self.loaders.insert(kind, loader);
    }

    pub fn supports(&self, kind: DocumentKind) -> bool {
        self.loaders.contains_key(&kind)
    }

    /// Load `source` into text. Consumes the source.
    #[instrument(skip_all, fields(kind = %source.kind()))]
    pub async fn load(&self, source: DocumentSource) -> Result<String> {
        let kind = source.kind();
        let loader = self
            .loaders
            .get(&kind)
            .ok_or_else(|| GascError::load(kind, "no loader registered"))?;

        let text = loader.load(&source).await.map_err(|e| match e {
            GascError::Load { .. } => e,
            other => GascError::load(kind, other.to_string()),
        })?;

        info!(source = %source.describe(), chars = text.chars().count(), "Document loaded");
        Ok(text)
    }
}

/// Error for a loader handed a source of another kind.
pub(crate) fn wrong_kind(expected: DocumentKind, source: &DocumentSource) -> GascError {
    GascError::load(
        expected,
        format!("loader received a {} source", source.kind()),
    )
}
