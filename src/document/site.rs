//! Web pages.
//!
//! Fetches the page and keeps only text a reader would see: `head`,
//! `script`, `style`, `noscript` and `template` subtrees are dropped, block
//! elements become line breaks, and runs of whitespace collapse.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Node};
use tracing::debug;

use crate::error::{GascError, Result};

use super::{wrong_kind, DocumentKind, DocumentSource, SourceLoader};

const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template", "svg"];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "section", "article", "header",
    "footer", "nav", "aside", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote",
];

/// Loads web pages as visible text.
pub struct SiteLoader {
    client: Client,
}

impl SiteLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GascError::load(DocumentKind::Site, format!("request failed: {}", e)))?;

        let status = response.status();
        // Challenge pages arrive as 403/503 with a body worth keeping
        if !status.is_success() && !status.is_server_error() && status.as_u16() != 403 {
            return Err(GascError::load(
                DocumentKind::Site,
                format!("{} returned {}", url, status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GascError::load(DocumentKind::Site, format!("unreadable body: {}", e)))?;
        debug!(url, status = status.as_u16(), bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

#[async_trait]
impl SourceLoader for SiteLoader {
    async fn load(&self, source: &DocumentSource) -> Result<String> {
        match source {
            DocumentSource::Site(url) => {
                let html = self.fetch(url).await?;
                Ok(visible_text(&html))
            }
            other => Err(wrong_kind(DocumentKind::Site, other)),
        }
    }
}

/// Extracts the visible text of an HTML document.
pub(crate) fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                });
                if !hidden {
                    raw.push_str(text);
                }
            }
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => raw.push('\n'),
            _ => {}
        }
    }

    normalize_lines(&raw)
}

/// Collapses whitespace inside lines and drops empty lines.
pub(crate) fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
