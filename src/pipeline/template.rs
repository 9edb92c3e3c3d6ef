//! Request template: system prompt, history replay slot, user input.

use crate::prompt::SystemPrompt;
use crate::providers::ChatMessage;
use crate::session::Message;

/// Renders `[system, history..., user]` message lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: SystemPrompt,
}

impl PromptTemplate {
    pub fn new(system: SystemPrompt) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &SystemPrompt {
        &self.system
    }

    /// Fill the template. History is replayed verbatim, in order.
    pub fn render(&self, history: &[Message], input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system.as_str()));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(input));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatRole;

    #[test]
    fn test_render_order() {
        let template = PromptTemplate::new(SystemPrompt::new("be helpful"));
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let messages = template.render(&history, "what's new?");

        let roles: Vec<ChatRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(messages[0].content, "be helpful");
        assert_eq!(messages[2].content, "hello");
        assert_eq!(messages[3].content, "what's new?");
    }

    #[test]
    fn test_render_empty_history() {
        let template = PromptTemplate::new(SystemPrompt::new("sys"));
        let messages = template.render(&[], "q");
        assert_eq!(messages.len(), 2);
    }
}
