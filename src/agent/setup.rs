//! Assistant setup: document, personas and model into a ready session.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::config::Config;
use crate::document::{DocumentLoader, DocumentSource};
use crate::error::Result;
use crate::persona::PersonaRegistry;
use crate::pipeline::{HttpModelFactory, ModelBinder, ModelConfig};
use crate::prompt::{PromptComposer, SystemPrompt};
use crate::session::ConversationSession;
use crate::tools::ToolRegistry;

use super::ChatLoop;

/// Everything chosen before a conversation starts.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub source: DocumentSource,
    /// Persona names; empty selects the default persona
    pub personas: Vec<String>,
    pub model: ModelConfig,
}

/// Wires the loader, composer and binder to one conversation session.
pub struct Assistant {
    personas: PersonaRegistry,
    loader: DocumentLoader,
    composer: PromptComposer,
    binder: ModelBinder,
    session: ConversationSession,
}

impl Assistant {
    /// Build the production assistant from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let personas = match &config.assistant.personas_file {
            Some(path) => PersonaRegistry::load_file(path)?,
            None => PersonaRegistry::builtin(),
        };

        let search_client = reqwest::Client::builder()
            .user_agent(config.loaders.user_agent.clone())
            .timeout(Duration::from_secs(config.loaders.timeout_secs))
            .build()?;
        let binder = ModelBinder::new(
            Arc::new(HttpModelFactory::new(config)?),
            ToolRegistry::with_defaults(search_client, &config.search),
        );

        Ok(Self::new(
            personas,
            DocumentLoader::new(&config.loaders)?,
            PromptComposer::new(config.assistant.name.clone()),
            binder,
            ConversationSession::new().with_history_window(config.assistant.history_window),
        ))
    }

    pub fn new(
        personas: PersonaRegistry,
        loader: DocumentLoader,
        composer: PromptComposer,
        binder: ModelBinder,
        session: ConversationSession,
    ) -> Self {
        Self {
            personas,
            loader,
            composer,
            binder,
            session,
        }
    }

    /// Load the document, compose the prompt, bind the model and configure
    /// the session.
    ///
    /// Cheap checks (personas, model, credential) run before the document
    /// is fetched. On any error the session keeps its previous
    /// configuration and history.
    ///
    /// # Errors
    ///
    /// - `GascError::UnknownPersona` for a name missing from the catalog
    /// - `GascError::InvalidModel` or `GascError::MissingCredential` from
    ///   model validation
    /// - `GascError::Load` if the document cannot be loaded
    /// - `GascError::SessionBusy` if a turn is streaming
    ///
    /// # Example
    /// ```no_run
    /// use gascai::{Assistant, Config, DocumentKind, DocumentSource, ModelConfig, Provider, SetupRequest};
    ///
    /// # async fn run() -> gascai::Result<()> {
    /// let assistant = Assistant::from_config(&Config::default())?;
    /// let prompt = assistant
    ///     .initialize(SetupRequest {
    ///         source: DocumentSource::open(DocumentKind::Site, "https://example.com").await?,
    ///         personas: vec!["Pesquisador Web".into()],
    ///         model: ModelConfig::new(Provider::Groq, "gemma2-9b-it", "gsk-..."),
    ///     })
    ///     .await?;
    /// println!("{}", prompt);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, fields(kind = %request.source.kind(), model = %request.model.model))]
    pub async fn initialize(&self, request: SetupRequest) -> Result<SystemPrompt> {
        let SetupRequest {
            source,
            personas,
            model,
        } = request;

        let personas = self.personas.select(personas.as_slice())?;
        self.binder.validate(&model)?;

        let kind = source.kind();
        let text = self.loader.load(source).await?;
        let prompt = self.composer.compose(&text, kind, &personas);
        let pipeline = self.binder.bind(&model, prompt.clone(), &personas)?;

        let names: Vec<String> = personas.iter().map(|p| p.name.clone()).collect();
        self.session.configure(pipeline, personas).await?;
        info!(personas = ?names, "Assistant initialized");

        Ok(prompt)
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    pub fn assistant_name(&self) -> &str {
        self.composer.assistant_name()
    }

    /// Chat loop over this assistant's session.
    pub fn chat_loop(&self) -> ChatLoop {
        ChatLoop::new(self.session.clone())
    }
}
