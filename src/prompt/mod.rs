//! System prompt assembly
//!
//! The system prompt is rebuilt wholesale whenever the document or persona
//! selection changes. Its layout is fixed:
//!
//! ```text
//! header      assistant name, role switching, document kind, web search
//! ####
//! document    verbatim text, or a "no content" note
//! ####
//! personas    "When acting as {name}:\n{description}" per selected persona
//! trailer     tool usage, persona announcement, output rules
//! ```

use std::fmt;

use tracing::{debug, warn};

use crate::document::DocumentKind;
use crate::persona::Persona;

/// Default assistant name used in the header.
pub const DEFAULT_ASSISTANT_NAME: &str = "GascAI";

const FENCE: &str = "####";
const EMPTY_DOCUMENT_NOTE: &str = "(No content available: the document is empty.)";

/// Immutable system prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt(String);

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SystemPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SystemPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether `text` looks like an anti-bot interstitial rather than content.
pub fn is_bot_challenge(text: &str) -> bool {
    text.contains("Just a moment") && (text.contains("Enable JavaScript") || text.contains("cookies"))
}

/// Builds system prompts from a document and a persona selection.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    assistant_name: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_ASSISTANT_NAME)
    }
}

impl PromptComposer {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        let name = assistant_name.into();
        let name = if name.trim().is_empty() {
            DEFAULT_ASSISTANT_NAME.to_string()
        } else {
            name
        };
        Self {
            assistant_name: name,
        }
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    /// Compose the system prompt. Never fails; empty text yields a prompt
    /// with the "no content" note in place of the document.
    pub fn compose(&self, document_text: &str, kind: DocumentKind, personas: &[Persona]) -> SystemPrompt {
        let mut prompt = String::with_capacity(document_text.len() + 2048);

        prompt.push_str(&format!(
            "You are {name}, a multi-purpose assistant that can switch between different roles.\n\
             You have access to the contents of a {kind} document and can search the internet:\n\n",
            name = self.assistant_name,
            kind = kind,
        ));

        prompt.push_str(FENCE);
        prompt.push('\n');
        if document_text.trim().is_empty() {
            prompt.push_str(EMPTY_DOCUMENT_NOTE);
        } else {
            prompt.push_str(document_text);
        }
        prompt.push('\n');
        prompt.push_str(FENCE);
        prompt.push_str("\n\n");

        let instructions: Vec<String> = personas
            .iter()
            .map(|p| format!("When acting as {}:\n{}", p.name, p.description))
            .collect();
        if !instructions.is_empty() {
            prompt.push_str(&instructions.join("\n\n"));
            prompt.push_str("\n\n");
        }

        prompt.push_str(
            "To search the internet, use the search tool available to you.\n\
             When you use information from the internet, cite the source.\n\n\
             Based on the user's question, adopt the most appropriate role among the selected agents.\n\
             Always state which agent role you are using to answer.\n\n\
             Whenever there is a $ in your output, replace it with S.\n\n\
             If the document information is something like \"Just a moment...Enable JavaScript and cookies to continue\", \
             suggest that the user load ",
        );
        prompt.push_str(&self.assistant_name);
        prompt.push_str(" again!");

        if is_bot_challenge(document_text) {
            warn!(kind = %kind, "Document looks like a bot-challenge page");
            prompt.push_str(
                "\n\nNOTICE: the loaded document is a bot-challenge page, not real content. \
                 Tell the user to reload the document before answering questions about it.",
            );
        }

        debug!(
            kind = %kind,
            personas = personas.len(),
            chars = prompt.len(),
            "Composed system prompt"
        );
        SystemPrompt(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRegistry;

    fn personas(names: &[&str]) -> Vec<Persona> {
        PersonaRegistry::builtin().get(names).unwrap()
    }

    #[test]
    fn test_compose_layout() {
        let selected = personas(&["Especialista em IA"]);
        let prompt = PromptComposer::default().compose("Version 2.0 release notes", DocumentKind::Text, &selected);
        let text = prompt.as_str();

        assert!(text.starts_with("You are GascAI"));
        assert!(text.contains("a Text document"));
        assert!(text.contains("####\nVersion 2.0 release notes\n####"));
        assert!(text.contains(&format!(
            "When acting as Especialista em IA:\n{}",
            selected[0].description
        )));

        let header = text.find("You are GascAI").unwrap();
        let document = text.find("Version 2.0").unwrap();
        let persona = text.find("When acting as").unwrap();
        let trailer = text.find("replace it with S").unwrap();
        assert!(header < document && document < persona && persona < trailer);
    }

    #[test]
    fn test_personas_in_selection_order() {
        let selected = personas(&["Pesquisador Web", "Consultor Criativo"]);
        let prompt = PromptComposer::default().compose("doc", DocumentKind::Site, &selected);
        let web = prompt.as_str().find("When acting as Pesquisador Web").unwrap();
        let creative = prompt.as_str().find("When acting as Consultor Criativo").unwrap();
        assert!(web < creative);
        assert!(!prompt.as_str().contains("When acting as Especialista em IA"));
    }

    #[test]
    fn test_empty_document_still_composes() {
        let prompt = PromptComposer::default().compose("", DocumentKind::Pdf, &personas(&["Especialista em IA"]));
        assert!(prompt.as_str().contains(EMPTY_DOCUMENT_NOTE));
        assert!(prompt.as_str().starts_with("You are GascAI"));
        assert!(prompt.as_str().contains("cite the source"));
    }

    #[test]
    fn test_trailer_rules_always_present() {
        let prompt = PromptComposer::default().compose("plain content", DocumentKind::Csv, &[]);
        let text = prompt.as_str();
        assert!(text.contains("Whenever there is a $ in your output, replace it with S."));
        assert!(text.contains("Just a moment...Enable JavaScript and cookies to continue"));
        assert!(text.contains("Always state which agent role"));
        assert!(!text.contains("NOTICE"));
    }

    #[test]
    fn test_bot_challenge_notice() {
        let page = "Just a moment...\nEnable JavaScript and cookies to continue";
        let prompt = PromptComposer::default().compose(page, DocumentKind::Site, &[]);
        assert!(prompt.as_str().contains("NOTICE: the loaded document is a bot-challenge page"));
    }

    #[test]
    fn test_is_bot_challenge() {
        assert!(is_bot_challenge("Just a moment... Enable JavaScript"));
        assert!(is_bot_challenge("Just a moment, checking cookies"));
        assert!(!is_bot_challenge("Just a moment of silence"));
        assert!(!is_bot_challenge("Enable JavaScript and cookies to continue"));
    }

    #[test]
    fn test_custom_assistant_name() {
        let composer = PromptComposer::new("Atlas");
        let prompt = composer.compose("x", DocumentKind::Video, &[]);
        assert!(prompt.as_str().starts_with("You are Atlas"));
        assert!(prompt.as_str().ends_with("load Atlas again!"));
        assert_eq!(PromptComposer::new("  ").assistant_name(), DEFAULT_ASSISTANT_NAME);
    }

    #[test]
    fn test_system_prompt_newtype() {
        let prompt = SystemPrompt::new("hello");
        assert_eq!(prompt.to_string(), "hello");
        assert_eq!(prompt.as_ref(), "hello");
        assert_eq!(prompt.len(), 5);
        assert!(!prompt.is_empty());
    }
}
