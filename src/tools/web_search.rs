//! Web search tool for GascAI
//!
//! Queries the DuckDuckGo HTML endpoint and returns ranked results with
//! their source URLs so the model can cite them.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::SearchConfig;
use crate::error::{GascError, Result};

use super::{Tool, WEB_SEARCH_TOOL};

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Tool for searching the web.
///
/// # Parameters
/// - `query`: The search query (required)
/// - `max_results`: Upper bound on returned results (optional)
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(client: Client, config: &SearchConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            max_results: config.max_results,
        }
    }

    /// Run a search and return parsed results.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| GascError::Tool(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GascError::Tool(format!(
                "Search endpoint returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GascError::Tool(format!("Failed to read search response: {}", e)))?;
        let results = parse_results(&body, max_results)?;
        debug!(query, results = results.len(), "Web search completed");
        Ok(results)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the web and return ranked results with their source URLs"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| GascError::Tool("Missing 'query' argument".into()))?;

        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).clamp(1, self.max_results.max(1)))
            .unwrap_or(self.max_results);

        let results = self.search(query, max_results).await?;
        Ok(format_results(query, &results))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| GascError::Tool(format!("Invalid selector {}: {}", css, e)))
}

/// Extracts ranked results from a DuckDuckGo HTML page.
pub(crate) fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut results = Vec::new();
    for node in document.select(&result_sel) {
        let Some(link) = node.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = collapse(&link.text().collect::<String>());
        if title.is_empty() {
            continue;
        }
        let snippet = node
            .select(&snippet_sel)
            .next()
            .map(|s| collapse(&s.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url: resolve_redirect(href),
            snippet,
        });
        if results.len() >= max_results {
            break;
        }
    }

    Ok(results)
}

/// Unwraps DuckDuckGo's `/l/?uddg=` redirect links.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for \"{}\".", query);
    }

    let mut out = format!("Search results for \"{}\":\n", query);
    for (rank, result) in results.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   Source: {}\n", rank + 1, result.title, result.url));
        if !result.snippet.is_empty() {
            out.push_str(&format!("   {}\n", result.snippet));
        }
    }
    out
}
