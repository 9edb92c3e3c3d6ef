//! Agent module - setup and the interactive chat loop
//!
//! [`Assistant`] turns the user's choices into a configured session:
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ DocumentLoad │──>│ PromptComposer │──>│ ModelBinder │──>│ Conversation │
//! │ (text)       │   │ (+ personas)   │   │ (+ tools)   │   │   Session    │
//! └──────────────┘   └────────────────┘   └─────────────┘   └──────┬───────┘
//!                                                                  │
//!                                                            ┌─────▼─────┐
//!                                                            │ ChatLoop  │
//!                                                            │ (ChatIo)  │
//!                                                            └───────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gascai::agent::{Assistant, SetupRequest, TerminalIo};
//! use gascai::config::Config;
//! use gascai::document::{DocumentKind, DocumentSource};
//! use gascai::pipeline::ModelConfig;
//!
//! async fn chat() -> gascai::Result<()> {
//!     let config = Config::load()?;
//!     let assistant = Assistant::from_config(&config)?;
//!     assistant
//!         .initialize(SetupRequest {
//!             source: DocumentSource::open(DocumentKind::Text, "notes.txt").await?,
//!             personas: vec!["Pesquisador Web".into()],
//!             model: ModelConfig::from_config(&config, None, None),
//!         })
//!         .await?;
//!
//!     let mut io = TerminalIo::new(assistant.assistant_name())?;
//!     assistant.chat_loop().run(&mut io).await
//! }
//! ```

mod r#loop;
mod setup;
mod terminal;

pub use r#loop::{ChatIo, ChatLoop};
pub use setup::{Assistant, SetupRequest};
pub use terminal::TerminalIo;
