//! Model binding
//!
//! [`ModelBinder`] turns a model choice, a system prompt and a persona
//! selection into a [`RequestPipeline`]: a validated chat-model handle with
//! the permitted tools attached, wrapped together with the request template.
//! Binding does no network I/O.

mod template;

pub use template::PromptTemplate;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::{Config, ModelSettings, ProvidersConfig};
use crate::error::{GascError, Result};
use crate::persona::Persona;
use crate::prompt::SystemPrompt;
use crate::providers::{ChatMessage, ChatModel, ChunkStream, OpenAiCompatModel, Provider};
use crate::session::Message;
use crate::tools::{Tool, ToolRegistry};

/// Provider, model and credential chosen for a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model: String,
    credential: String,
}

impl ModelConfig {
    pub fn new(provider: Provider, model: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            credential: credential.into(),
        }
    }

    /// Resolve from configuration. An explicit `api_key` wins over the
    /// configured key; a missing key becomes an empty credential.
    pub fn from_config(config: &Config, model: Option<&str>, api_key: Option<&str>) -> Self {
        let provider = config.model.provider;
        let model = model
            .map(str::to_string)
            .unwrap_or_else(|| config.model.model.clone());
        let credential = api_key
            .or_else(|| config.providers.api_key(provider))
            .unwrap_or_default();
        Self::new(provider, model, credential)
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// Builds chat-model handles.
#[cfg_attr(test, mockall::automock)]
pub trait ModelFactory: Send + Sync {
    /// Construct a handle for an already validated `config`.
    fn create(&self, config: &ModelConfig, tools: Vec<Arc<dyn Tool>>) -> Result<Arc<dyn ChatModel>>;
}

/// Factory for the OpenAI-compatible HTTP client.
pub struct HttpModelFactory {
    client: Client,
    settings: ModelSettings,
    providers: ProvidersConfig,
}

impl HttpModelFactory {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.model.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings: config.model.clone(),
            providers: config.providers.clone(),
        })
    }
}

impl ModelFactory for HttpModelFactory {
    fn create(&self, config: &ModelConfig, tools: Vec<Arc<dyn Tool>>) -> Result<Arc<dyn ChatModel>> {
        let model = OpenAiCompatModel::new(
            self.client.clone(),
            config.provider,
            config.credential(),
            config.model.clone(),
        )
        .with_base_url(self.providers.base_url(config.provider))
        .with_max_tokens(self.settings.max_tokens)
        .with_temperature(self.settings.temperature)
        .with_max_tool_iterations(self.settings.max_tool_iterations)
        .with_tools(tools);
        Ok(Arc::new(model))
    }
}

/// Validates model choices and binds request pipelines.
#[derive(Clone)]
pub struct ModelBinder {
    factory: Arc<dyn ModelFactory>,
    tools: ToolRegistry,
}

impl ModelBinder {
    pub fn new(factory: Arc<dyn ModelFactory>, tools: ToolRegistry) -> Self {
        Self { factory, tools }
    }

    /// Check the allow-list, then the credential.
    pub fn validate(&self, config: &ModelConfig) -> Result<()> {
        if !config.provider.supports(&config.model) {
            return Err(GascError::InvalidModel {
                provider: config.provider,
                model: config.model.clone(),
            });
        }
        if config.credential().trim().is_empty() {
            return Err(GascError::MissingCredential(config.provider));
        }
        Ok(())
    }

    /// Bind `config` with the tools permitted by `personas`.
    pub fn bind(
        &self,
        config: &ModelConfig,
        system_prompt: SystemPrompt,
        personas: &[Persona],
    ) -> Result<RequestPipeline> {
        self.validate(config)?;

        let tools = self.permitted_tools(personas);
        let model = self.factory.create(config, tools)?;
        info!(
            provider = %config.provider,
            model = %config.model,
            tools = ?model.tool_names(),
            "Bound model pipeline"
        );

        Ok(RequestPipeline::new(system_prompt, model))
    }

    /// Union of the personas' tool ids, in selection order, that have an
    /// implementation.
    fn permitted_tools(&self, personas: &[Persona]) -> Vec<Arc<dyn Tool>> {
        let mut seen: Vec<&str> = Vec::new();
        let mut tools = Vec::new();

        for id in personas.iter().flat_map(|p| p.allowed_tools.iter()) {
            if seen.contains(&id.as_str()) {
                continue;
            }
            seen.push(id);
            match self.tools.get(id) {
                Some(tool) => tools.push(tool),
                None => debug!(tool = %id, "No implementation for tool, skipping"),
            }
        }

        tools
    }
}

/// A bound model plus its request template. Immutable and cheap to clone.
#[derive(Clone)]
pub struct RequestPipeline {
    template: PromptTemplate,
    model: Arc<dyn ChatModel>,
}

impl RequestPipeline {
    pub fn new(system_prompt: SystemPrompt, model: Arc<dyn ChatModel>) -> Self {
        Self {
            template: PromptTemplate::new(system_prompt),
            model,
        }
    }

    pub fn system_prompt(&self) -> &SystemPrompt {
        self.template.system()
    }

    pub fn provider(&self) -> Provider {
        self.model.provider()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.model.tool_names()
    }

    pub fn render(&self, history: &[Message], input: &str) -> Vec<ChatMessage> {
        self.template.render(history, input)
    }

    /// Start a reply to `input` given `history`. Lazy until polled.
    pub fn stream(&self, history: &[Message], input: &str) -> ChunkStream {
        self.model.generate(self.render(history, input))
    }
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("provider", &self.provider())
            .field("model", &self.model_name())
            .field("tools", &self.tool_names())
            .finish()
    }
}
