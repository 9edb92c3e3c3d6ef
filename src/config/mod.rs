//! Configuration for GascAI
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `~/.gascai/config.toml`
//! 3. Environment variables (a `.env` file is loaded first)
//! 4. Command-line flags (applied by the binary)
//!
//! Every field has a default, so an empty or missing file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GascError, Result};
use crate::persona::DEFAULT_PERSONA;
use crate::providers::Provider;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assistant: AssistantConfig,
    pub model: ModelSettings,
    pub providers: ProvidersConfig,
    pub loaders: LoaderConfig,
    pub search: SearchConfig,
}

/// Assistant identity and session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Name the assistant introduces itself with
    pub name: String,
    /// Personas selected when none are given
    pub default_personas: Vec<String>,
    /// Replay only the most recent N messages per turn (unbounded if unset)
    pub history_window: Option<usize>,
    /// Replaces the built-in persona catalog
    pub personas_file: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "GascAI".to_string(),
            default_personas: vec![DEFAULT_PERSONA.to_string()],
            history_window: None,
            personas_file: None,
        }
    }
}

/// Model selection and generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: Provider,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Rounds of tool calls allowed per reply
    pub max_tool_iterations: usize,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Groq,
            model: Provider::Groq.default_model().to_string(),
            max_tokens: None,
            temperature: None,
            max_tool_iterations: 4,
            request_timeout_secs: 120,
        }
    }
}

/// Per-provider credentials and endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub groq: ProviderEntry,
    pub openai: ProviderEntry,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    pub api_key: Option<String>,
    /// Overrides the provider's public endpoint
    pub base_url: Option<String>,
}

impl ProvidersConfig {
    pub fn entry(&self, provider: Provider) -> &ProviderEntry {
        match provider {
            Provider::Groq => &self.groq,
            Provider::OpenAI => &self.openai,
        }
    }

    fn entry_mut(&mut self, provider: Provider) -> &mut ProviderEntry {
        match provider {
            Provider::Groq => &mut self.groq,
            Provider::OpenAI => &mut self.openai,
        }
    }

    /// Configured API key, if any.
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        self.entry(provider).api_key.as_deref()
    }

    /// Endpoint to use for `provider`.
    pub fn base_url(&self, provider: Provider) -> &str {
        self.entry(provider)
            .base_url
            .as_deref()
            .unwrap_or_else(|| provider.default_base_url())
    }
}

/// Document loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Caption languages in order of preference
    pub transcript_languages: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Mozilla/5.0 (compatible; gascai/{})", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            transcript_languages: vec!["pt".to_string(), "en".to_string()],
        }
    }
}

/// Web search tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 5,
        }
    }
}

impl Config {
    /// Base directory: `~/.gascai`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gascai")
    }

    /// Default config file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| GascError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("GASCAI_PROVIDER").and_then(|v| v.parse::<Provider>().ok()) {
            if provider != self.model.provider && !provider.supports(&self.model.model) {
                self.model.model = provider.default_model().to_string();
            }
            self.model.provider = provider;
        }
        if let Some(model) = get("GASCAI_MODEL") {
            self.model.model = model;
        }
        if let Some(window) = get("GASCAI_HISTORY_WINDOW").and_then(|v| v.parse().ok()) {
            self.assistant.history_window = Some(window);
        }
        for provider in Provider::ALL {
            if let Some(key) = get(provider.api_key_env()) {
                let entry = self.providers.entry_mut(provider);
                if entry.api_key.is_none() {
                    entry.api_key = Some(key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.assistant.name, "GascAI");
        assert_eq!(config.assistant.default_personas, vec![DEFAULT_PERSONA]);
        assert!(config.assistant.history_window.is_none());
        assert_eq!(config.model.provider, Provider::Groq);
        assert!(config.model.provider.supports(&config.model.model));
        assert_eq!(config.loaders.transcript_languages, vec!["pt", "en"]);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [model]
            provider = "openai"
            model = "gpt-4o"

            [providers.openai]
            api_key = "sk-file"

            [assistant]
            history_window = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.model.provider, Provider::OpenAI);
        assert_eq!(config.model.model, "gpt-4o");
        assert_eq!(config.providers.api_key(Provider::OpenAI), Some("sk-file"));
        assert_eq!(config.providers.api_key(Provider::Groq), None);
        assert_eq!(config.assistant.history_window, Some(20));
        assert_eq!(config.assistant.name, "GascAI");
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[model]\nprovider = \"anthropic\"").unwrap_err();
        assert!(matches!(err, GascError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.assistant.name, "GascAI");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[assistant]\nname = \"Doc\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.assistant.name, "Doc");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_with(env(&[
            ("GASCAI_PROVIDER", "OpenAI"),
            ("OPENAI_API_KEY", "sk-env"),
            ("GROQ_API_KEY", "  "),
            ("GASCAI_HISTORY_WINDOW", "6"),
        ]));

        assert_eq!(config.model.provider, Provider::OpenAI);
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(config.providers.api_key(Provider::OpenAI), Some("sk-env"));
        assert_eq!(config.providers.api_key(Provider::Groq), None);
        assert_eq!(config.assistant.history_window, Some(6));
    }

    #[test]
    fn test_env_does_not_replace_file_key() {
        let mut config = Config::default();
        config.providers.groq.api_key = Some("gsk-file".into());
        config.apply_env_with(env(&[("GROQ_API_KEY", "gsk-env")]));
        assert_eq!(config.providers.api_key(Provider::Groq), Some("gsk-file"));
    }

    #[test]
    fn test_base_url_override() {
        let mut config = Config::default();
        assert_eq!(
            config.providers.base_url(Provider::OpenAI),
            "https://api.openai.com/v1"
        );
        config.providers.openai.base_url = Some("http://localhost:4000/v1".into());
        assert_eq!(
            config.providers.base_url(Provider::OpenAI),
            "http://localhost:4000/v1"
        );
    }
}
