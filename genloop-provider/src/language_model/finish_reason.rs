use serde::{Deserialize, Serialize};

/// The categorical outcome of a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model generated a natural stop or hit a stop sequence.
    Stop,
    /// The token limit was reached.
    Length,
    /// The response was cut by a content filter.
    ContentFilter,
    /// The model requested tool calls.
    ToolCalls,
    /// The provider reported an error.
    Error,
    /// Any other provider-specific reason.
    Other,
    /// No finish reason has been observed yet.
    ///
    /// Used as the streaming aggregator's initial value; never produced by
    /// a well-behaved provider response.
    #[default]
    Unknown,
}
