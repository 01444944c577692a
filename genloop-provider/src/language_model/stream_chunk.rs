use crate::language_model::call_warning::CallWarning;
use crate::language_model::finish_reason::FinishReason;
use crate::language_model::tool_call::ToolCall;
use crate::language_model::usage::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transport-level chunk produced by a streaming generation call.
///
/// A well-formed stream emits any number of `TextDelta` / `ToolCall` /
/// `Usage` / `Warning` chunks and terminates with exactly one `Finish`.
/// `Usage` chunks are combined monoidally by the aggregator; `Warning`
/// chunks are collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamChunk {
    /// An increment of generated text.
    TextDelta {
        /// The text fragment.
        delta: String,
    },

    /// A complete tool call.
    ToolCall {
        /// The parsed tool call.
        tool_call: ToolCall,
    },

    /// A usage report; may appear zero or more times.
    Usage {
        /// The reported usage.
        usage: Usage,
    },

    /// The terminal chunk.
    #[serde(rename_all = "camelCase")]
    Finish {
        /// Why generation finished.
        finish_reason: FinishReason,
        /// Opaque provider information about automatic history cleanup.
        #[serde(skip_serializing_if = "Option::is_none")]
        context_management: Option<Value>,
    },

    /// A non-fatal provider warning.
    Warning {
        /// The warning.
        warning: CallWarning,
    },
}

impl StreamChunk {
    /// Creates a text delta chunk.
    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }

    /// Creates a finish chunk without context-management info.
    pub fn finish(finish_reason: FinishReason) -> Self {
        Self::Finish {
            finish_reason,
            context_management: None,
        }
    }

    /// True if this is the terminal chunk.
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_detection() {
        assert!(StreamChunk::finish(FinishReason::Stop).is_finish());
        assert!(!StreamChunk::text_delta("hi").is_finish());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&StreamChunk::text_delta("hi")).unwrap();
        assert_eq!(json, "{\"type\":\"text-delta\",\"delta\":\"hi\"}");

        let json = serde_json::to_string(&StreamChunk::finish(FinishReason::Stop)).unwrap();
        assert!(json.contains("\"finishReason\":\"stop\""));
    }
}
