//! GascAI - document-grounded multi-persona chat assistant
//!
//! Load one document (web page, YouTube transcript, PDF, CSV or text),
//! pick one or more personas and a model, then chat about the document.
//! Replies stream chunk by chunk; the conversation history is replayed on
//! every turn.
//!
//! # Modules
//!
//! - [`document`]: document sources and per-kind loaders
//! - [`persona`]: persona catalog
//! - [`prompt`]: system prompt assembly
//! - [`pipeline`]: model validation and binding
//! - [`session`]: conversation history and turn-taking
//! - [`agent`]: setup orchestration and the chat loop
//! - [`providers`]: chat-model clients
//! - [`tools`]: tools the model may call (web search)
//! - [`config`]: configuration file and environment overrides

pub mod agent;
pub mod config;
pub mod document;
pub mod error;
pub mod persona;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod tools;

pub use agent::{Assistant, ChatIo, ChatLoop, SetupRequest};
pub use config::Config;
pub use document::{DocumentKind, DocumentLoader, DocumentSource};
pub use error::{GascError, Result};
pub use persona::{Persona, PersonaRegistry};
pub use pipeline::{ModelBinder, ModelConfig, ModelFactory, RequestPipeline};
pub use prompt::{PromptComposer, SystemPrompt};
pub use providers::{ChatMessage, ChatModel, ChunkStream, Provider};
pub use session::{ConversationSession, Message, Role, TurnStream};
