//! LLM provider abstraction
//!
//! A provider is a company that serves chat models (Groq, OpenAI). Each
//! provider offers a fixed allow-list of model names. A bound model handle
//! implements [`ChatModel`]: it turns a rendered message list into a lazy,
//! finite stream of text chunks.
//!
//! Both supported providers speak the OpenAI chat-completions wire format,
//! so a single client ([`OpenAiCompatModel`]) serves them.

mod openai;

pub use openai::OpenAiCompatModel;

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::{GascError, Result};

/// Lazy, forward-only sequence of reply chunks.
///
/// Finite and not restartable: consuming a reply twice requires a new
/// `generate` call. Dropping the stream early releases the underlying
/// HTTP response.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "groq", alias = "Groq")]
    Groq,
    #[serde(rename = "openai", alias = "OpenAI")]
    OpenAI,
}

const GROQ_MODELS: &[&str] = &["llama-3.1-70b-versatile", "gemma2-9b-it", "mixtral-8x7b-32768"];
const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "o1-preview", "o1-mini"];

impl Provider {
    /// All providers, in display order.
    pub const ALL: [Provider; 2] = [Provider::Groq, Provider::OpenAI];

    /// Models this provider accepts.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Groq => GROQ_MODELS,
            Provider::OpenAI => OPENAI_MODELS,
        }
    }

    /// Whether `model` is on this provider's allow-list.
    pub fn supports(&self, model: &str) -> bool {
        self.models().contains(&model)
    }

    /// First model of the allow-list.
    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }

    /// Base URL of the OpenAI-compatible API.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Groq => write!(f, "Groq"),
            Provider::OpenAI => write!(f, "OpenAI"),
        }
    }
}

impl FromStr for Provider {
    type Err = GascError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAI),
            other => Err(GascError::Config(format!("Unknown provider: {}", other))),
        }
    }
}

/// Role of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// One entry of a rendered chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(ChatRole::Assistant, content)
        }
    }

    pub fn tool_result(call_id: &str, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::plain(ChatRole::Tool, content)
        }
    }
}

/// A bound chat-model handle.
pub trait ChatModel: Send + Sync {
    /// Provider serving this handle.
    fn provider(&self) -> Provider;

    /// Model name this handle is scoped to.
    fn model_name(&self) -> &str;

    /// Names of the tools the model may call, in attachment order.
    fn tool_names(&self) -> Vec<String>;

    /// Start generating a reply for `messages`.
    ///
    /// No I/O happens until the returned stream is polled.
    fn generate(&self, messages: Vec<ChatMessage>) -> ChunkStream;
}
