use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of a tool call.
///
/// For completed locally-executed calls exactly one of `output` / `error`
/// is populated. A provider-executed call may be *pending*: both fields
/// absent until a later provider response resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// The id of the tool call this result answers.
    pub tool_call_id: String,

    /// The name of the tool.
    pub tool_name: String,

    /// The result value on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// The error value on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Whether the call was executed by the provider.
    #[serde(default)]
    pub provider_executed: bool,

    /// Wall-clock duration of the local execution, in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl ToolResult {
    /// Creates a successful result for a locally-executed call.
    pub fn success(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output: Some(output),
            error: None,
            provider_executed: false,
            duration_ms: 0,
        }
    }

    /// Creates a failed result for a locally-executed call.
    pub fn failure(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output: None,
            error: Some(error),
            provider_executed: false,
            duration_ms: 0,
        }
    }

    /// Creates a pending result for a provider-executed call.
    pub fn pending(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output: None,
            error: None,
            provider_executed: true,
            duration_ms: 0,
        }
    }

    /// Sets the provider-executed flag.
    pub fn with_provider_executed(mut self, provider_executed: bool) -> Self {
        self.provider_executed = provider_executed;
        self
    }

    /// Sets the execution duration.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// True if neither output nor error has been recorded yet.
    pub fn is_pending(&self) -> bool {
        self.output.is_none() && self.error.is_none()
    }

    /// True if this result records a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success() {
        let result = ToolResult::success("call_1", "calc", json!("4"));
        assert_eq!(result.output, Some(json!("4")));
        assert!(result.error.is_none());
        assert!(!result.provider_executed);
        assert!(!result.is_pending());
        assert!(!result.is_error());
    }

    #[test]
    fn test_failure() {
        let result = ToolResult::failure("call_1", "calc", json!({"message": "boom"}));
        assert!(result.output.is_none());
        assert!(result.is_error());
    }

    #[test]
    fn test_pending() {
        let result = ToolResult::pending("call_1", "web_search");
        assert!(result.is_pending());
        assert!(result.provider_executed);
    }
}
