/// Call settings, timeout and retention configuration.
pub mod call_settings;

use crate::error::EngineError;
use genloop_provider::Message;
use serde::{Deserialize, Serialize};

/// The prompt part of a generation call: an optional system message plus
/// either a bare text prompt or a message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// System instructions, kept separate from the message history.
    /// Providers decide placement; the engine never prepends it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The main content of the prompt.
    #[serde(flatten)]
    pub content: PromptContent,
}

/// The content of a prompt.
///
/// When both a bare text prompt and a message history are supplied at the
/// entry point, the message history wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptContent {
    /// A simple text prompt, lifted to a single user message.
    Text {
        /// The prompt text.
        #[serde(rename = "prompt")]
        text: String,
    },
    /// A conversation history.
    Messages {
        /// The messages.
        messages: Vec<Message>,
    },
}

impl Prompt {
    /// Creates a prompt from bare text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            system: None,
            content: PromptContent::Text { text: text.into() },
        }
    }

    /// Creates a prompt from a message history.
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            system: None,
            content: PromptContent::Messages { messages },
        }
    }

    /// Sets the system instructions.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Self::messages(messages)
    }
}

/// A validated prompt: system instructions plus a non-empty message list.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedPrompt {
    /// System instructions.
    pub system: Option<String>,

    /// The initial conversation history.
    pub messages: Vec<Message>,
}

/// Validates a prompt and lifts bare text into a single user message.
pub fn validate_and_standardize(prompt: Prompt) -> Result<StandardizedPrompt, EngineError> {
    let messages = match prompt.content {
        PromptContent::Text { text } => vec![Message::user(text)],
        PromptContent::Messages { messages } => {
            if messages.is_empty() {
                return Err(EngineError::invalid_prompt("messages must not be empty"));
            }
            messages
        }
    };

    Ok(StandardizedPrompt {
        system: prompt.system,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use genloop_provider::Role;

    #[test]
    fn test_text_prompt_is_lifted_to_user_message() {
        let standardized = validate_and_standardize(Prompt::text("hi")).unwrap();
        assert_eq!(standardized.messages.len(), 1);
        assert_eq!(standardized.messages[0].role, Role::User);
        assert_eq!(standardized.messages[0].text(), "hi");
        assert!(standardized.system.is_none());
    }

    #[test]
    fn test_system_is_kept_separate() {
        let standardized =
            validate_and_standardize(Prompt::text("hi").with_system("be terse")).unwrap();
        assert_eq!(standardized.system.as_deref(), Some("be terse"));
        // System never appears in the message list.
        assert!(standardized.messages.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_empty_messages_rejected() {
        let result = validate_and_standardize(Prompt::messages(vec![]));
        match result {
            Err(EngineError::InvalidPrompt { message }) => {
                assert_eq!(message, "messages must not be empty");
            }
            other => panic!("expected InvalidPrompt, got {other:?}"),
        }
    }

    #[test]
    fn test_message_history_preserved() {
        let messages = vec![Message::user("a"), Message::assistant(vec![])];
        let standardized = validate_and_standardize(Prompt::messages(messages.clone())).unwrap();
        assert_eq!(standardized.messages, messages);
    }

    #[test]
    fn test_from_impls() {
        let prompt: Prompt = "hello".into();
        assert!(matches!(prompt.content, PromptContent::Text { .. }));

        let prompt: Prompt = vec![Message::user("hello")].into();
        assert!(matches!(prompt.content, PromptContent::Messages { .. }));
    }
}
