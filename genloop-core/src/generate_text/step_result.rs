use genloop_provider::{CallWarning, FinishReason, ToolCall, ToolResult, Usage};
use serde::{Deserialize, Serialize};

/// The result of a single step: one provider call plus any local tool
/// executions that consumed its tool calls.
///
/// Created at the end of each provider call inside the loop, appended to
/// the engine's step list, and immutable after append. `tool_results`
/// matches `tool_calls` index for index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// 1-based position of this step in the run.
    pub step_number: usize,

    /// The text generated in this step.
    pub text: String,

    /// Tool calls requested in this step, in call order.
    pub tool_calls: Vec<ToolCall>,

    /// Tool results, index-aligned with `tool_calls`.
    pub tool_results: Vec<ToolResult>,

    /// Why this step's generation finished.
    pub finish_reason: FinishReason,

    /// Token usage of this step.
    pub usage: Usage,

    /// Non-fatal warnings from the provider.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CallWarning>,
}

impl StepResult {
    /// Creates a step result.
    pub fn new(
        step_number: usize,
        text: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        tool_results: Vec<ToolResult>,
        finish_reason: FinishReason,
        usage: Usage,
        warnings: Vec<CallWarning>,
    ) -> Self {
        Self {
            step_number,
            text: text.into(),
            tool_calls,
            tool_results,
            finish_reason,
            usage,
            warnings,
        }
    }

    /// True if this step requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
