//! Tools the model may call during a reply
//!
//! A persona lists the tool identifiers it is permitted to use. The
//! [`ToolRegistry`] maps identifiers to implementations; identifiers without
//! an implementation are skipped when a pipeline is bound.

pub mod web_search;

pub use web_search::{SearchResult, WebSearchTool};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::SearchConfig;
use crate::error::Result;

/// Identifier of the web-search tool in the persona catalog.
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// A callable tool exposed to the model as a function.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name shown to the model.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool with the model-provided arguments.
    async fn execute(&self, args: Value) -> Result<String>;
}

/// Maps persona tool identifiers to implementations.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in web-search tool.
    pub fn with_defaults(client: reqwest::Client, search: &SearchConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            WEB_SEARCH_TOOL,
            Arc::new(WebSearchTool::new(client, search)),
        );
        registry
    }

    pub fn register(&mut self, id: &str, tool: Arc<dyn Tool>) {
        self.tools.insert(id.to_string(), tool);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
