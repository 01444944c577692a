use super::step_result::StepResult;
use genloop_provider::{CallWarning, FinishReason, ToolCall, ToolResult, Usage};
use serde_json::Value;

/// The result of a completed multi-step generation.
///
/// Owned exclusively by the caller after the facade returns; the engine
/// retains no reference.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateTextResult {
    /// The text of the final step.
    pub text: String,

    /// All tool calls across all steps, in step and call order.
    pub tool_calls: Vec<ToolCall>,

    /// All tool results across all steps. Pending provider-executed
    /// results are replaced by their resolution when a later provider
    /// response supplied one.
    pub tool_results: Vec<ToolResult>,

    /// All steps of the run.
    pub steps: Vec<StepResult>,

    /// The finish reason of the final step.
    pub finish_reason: FinishReason,

    /// Usage summed over all steps.
    pub total_usage: Usage,

    /// Warnings collected across all steps.
    pub warnings: Vec<CallWarning>,

    /// The reason supplied by the stop condition that ended the run;
    /// empty when the run ended naturally.
    pub stop_reason: String,

    /// The parsed value of the output specification, when one was given.
    pub output: Option<Value>,

    /// The raw request body of the final step, when retention asked for it.
    pub raw_request: Option<Value>,

    /// The raw response body of the final step, when retention asked for it.
    pub raw_response: Option<Value>,
}

impl GenerateTextResult {
    /// Builds the caller-facing aggregate from the recorded steps.
    pub(crate) fn from_steps(
        steps: Vec<StepResult>,
        total_usage: Usage,
        tool_results: Vec<ToolResult>,
        stop_reason: String,
    ) -> Self {
        let text = steps.last().map(|s| s.text.clone()).unwrap_or_default();
        let finish_reason = steps
            .last()
            .map(|s| s.finish_reason)
            .unwrap_or(FinishReason::Unknown);
        let tool_calls = steps
            .iter()
            .flat_map(|s| s.tool_calls.iter().cloned())
            .collect();
        let warnings = steps
            .iter()
            .flat_map(|s| s.warnings.iter().cloned())
            .collect();

        Self {
            text,
            tool_calls,
            tool_results,
            steps,
            finish_reason,
            total_usage,
            warnings,
            stop_reason,
            output: None,
            raw_request: None,
            raw_response: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_steps_aggregates() {
        let steps = vec![
            StepResult::new(
                1,
                "",
                vec![ToolCall::new("call_1", "calc", json!({}))],
                vec![ToolResult::success("call_1", "calc", json!("4"))],
                FinishReason::ToolCalls,
                Usage::new(1, 2),
                vec![CallWarning::other("first")],
            ),
            StepResult::new(
                2,
                "The answer is 4.",
                vec![],
                vec![],
                FinishReason::Stop,
                Usage::new(3, 4),
                vec![],
            ),
        ];
        let total_usage = steps
            .iter()
            .fold(Usage::default(), |acc, s| acc.add(&s.usage));
        let tool_results = steps
            .iter()
            .flat_map(|s| s.tool_results.iter().cloned())
            .collect();

        let result =
            GenerateTextResult::from_steps(steps, total_usage, tool_results, String::new());

        assert_eq!(result.text, "The answer is 4.");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_results.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.total_usage, Usage::new(4, 6));
        assert_eq!(result.stop_reason, "");
    }
}
