//! Error types for GascAI
//!
//! All library operations return [`Result`], whose error side is
//! [`GascError`]. Variants follow the lifecycle of a session: document
//! loading, configuration (personas, model, credential), and turn-taking.

use thiserror::Error;

use crate::document::DocumentKind;
use crate::providers::Provider;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum GascError {
    /// A document could not be fetched or decoded.
    #[error("Failed to load {kind} document: {message}")]
    Load { kind: DocumentKind, message: String },

    /// A document kind name that has no loader.
    #[error("Unknown document kind: {0}")]
    UnknownDocumentKind(String),

    /// A persona name not present in the registry.
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    /// The provider does not offer the requested model.
    #[error("Model '{model}' is not available for provider {provider}")]
    InvalidModel { provider: Provider, model: String },

    /// Empty or blank API key.
    #[error("Missing API key for provider {0}")]
    MissingCredential(Provider),

    /// A turn was submitted before any pipeline was bound.
    #[error("Assistant is not initialized; load a document and select a model first")]
    NotConfigured,

    /// The model failed while producing a reply.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Another turn is still streaming on this session.
    #[error("Session is busy with another turn")]
    SessionBusy,

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// Provider transport or protocol error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GascError {
    /// Shorthand for a [`GascError::Load`] error.
    pub fn load(kind: DocumentKind, message: impl Into<String>) -> Self {
        Self::Load {
            kind,
            message: message.into(),
        }
    }

    /// Whether the error came from a configuration attempt.
    ///
    /// Configuration errors never leave a partially bound pipeline behind.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownPersona(_)
                | Self::InvalidModel { .. }
                | Self::MissingCredential(_)
                | Self::UnknownDocumentKind(_)
                | Self::Config(_)
        )
    }
}

impl From<toml::de::Error> for GascError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GascError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = GascError::load(DocumentKind::Pdf, "broken xref table");
        assert_eq!(
            err.to_string(),
            "Failed to load Pdf document: broken xref table"
        );
    }

    #[test]
    fn test_invalid_model_display() {
        let err = GascError::InvalidModel {
            provider: Provider::Groq,
            model: "gpt-4o".into(),
        };
        assert!(err.to_string().contains("gpt-4o"));
        assert!(err.to_string().contains("Groq"));
    }

    #[test]
    fn test_is_configuration() {
        assert!(GascError::MissingCredential(Provider::OpenAI).is_configuration());
        assert!(GascError::UnknownPersona("x".into()).is_configuration());
        assert!(!GascError::NotConfigured.is_configuration());
        assert!(!GascError::SessionBusy.is_configuration());
        assert!(!GascError::Generation("boom".into()).is_configuration());
    }
}
