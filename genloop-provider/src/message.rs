use crate::language_model::tool_call::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool output fed back to the model.
    Tool,
}

/// A single message in a conversation: a role paired with an ordered
/// sequence of content parts.
///
/// Messages are immutable once appended to conversation history; the engine
/// only ever extends the history, never rewrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,

    /// The ordered content parts of the message.
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Creates a system message with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Creates a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Creates an assistant message from content parts.
    pub fn assistant(content: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Creates a tool message carrying a single tool result part.
    pub fn tool(result: ToolResultPart) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult(result)],
        }
    }

    /// Returns the concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Returns true if this message was authored by the user.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Returns true if this message was authored by the assistant.
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// One part of a message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },

    /// An image, either by URL or as raw bytes.
    Image {
        /// Where the image data comes from.
        source: ImageSource,
        /// IANA media type, e.g. `image/png`.
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },

    /// A tool call authored by the assistant.
    ToolCall(ToolCall),

    /// A tool result authored by a tool.
    ToolResult(ToolResultPart),
}

impl ContentPart {
    /// Creates a text content part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image content part referencing a URL.
    pub fn image_url(url: impl Into<String>, media_type: Option<String>) -> Self {
        Self::Image {
            source: ImageSource::Url(url.into()),
            media_type,
        }
    }

    /// Creates an image content part from raw bytes.
    pub fn image_bytes(bytes: Vec<u8>, media_type: Option<String>) -> Self {
        Self::Image {
            source: ImageSource::Bytes(bytes),
            media_type,
        }
    }
}

/// The origin of image data in an [`ContentPart::Image`] part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// A URL the provider can fetch.
    Url(String),
    /// Raw image bytes.
    Bytes(Vec<u8>),
}

/// A tool result carried inside a tool message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPart {
    /// The id of the tool call this result answers.
    pub tool_call_id: String,

    /// The name of the tool that produced the result.
    pub tool_name: String,

    /// The result payload (or the error payload when `is_error` is set).
    pub output: Value,

    /// Whether the payload describes a failure.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultPart {
    /// Creates a successful tool result part.
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output,
            is_error: false,
        }
    }

    /// Marks this result part as an error.
    pub fn with_is_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_text_joins_parts() {
        let message = Message {
            role: Role::Assistant,
            content: vec![ContentPart::text("Hello "), ContentPart::text("world")],
        };
        assert_eq!(message.text(), "Hello world");
    }

    #[test]
    fn test_message_text_skips_non_text_parts() {
        let message = Message {
            role: Role::Assistant,
            content: vec![
                ContentPart::text("before"),
                ContentPart::ToolCall(ToolCall::new("call_1", "lookup", json!({}))),
            ],
        };
        assert_eq!(message.text(), "before");
    }

    #[test]
    fn test_user_constructor() {
        let message = Message::user("hi");
        assert_eq!(message.role, Role::User);
        assert!(message.is_user());
        assert_eq!(message.text(), "hi");
    }

    #[test]
    fn test_tool_message() {
        let message = Message::tool(ToolResultPart::new("call_1", "calc", json!("4")));
        assert_eq!(message.role, Role::Tool);
        match &message.content[0] {
            ContentPart::ToolResult(part) => {
                assert_eq!(part.tool_call_id, "call_1");
                assert!(!part.is_error);
            }
            _ => panic!("expected tool result part"),
        }
    }

    #[test]
    fn test_content_part_serialization() {
        let part = ContentPart::text("hi");
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"type\":\"text\""));

        let part = ContentPart::image_url("https://example.com/cat.png", None);
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"type\":\"image\""));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }
}
