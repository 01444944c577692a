use super::step_result::StepResult;
use async_trait::async_trait;
use genloop_provider::{Message, Usage};

/// The engine state a stop condition sees after each step.
#[derive(Debug, Clone, Copy)]
pub struct StopState<'a> {
    /// The steps completed so far.
    pub steps: &'a [StepResult],

    /// The conversation history, including messages appended by completed
    /// steps.
    pub messages: &'a [Message],

    /// Usage accumulated over all completed steps.
    pub usage: &'a Usage,
}

/// A condition that can terminate the multi-step loop.
///
/// Returns a human-readable reason to stop, or an empty string to
/// continue. Conditions must be cheap; they run after every step. Side
/// effects (e.g. metrics) are permitted - the evaluator invokes every
/// condition each round before picking a winner.
///
/// # Example
///
/// ```ignore
/// struct BudgetExceeded;
///
/// #[async_trait]
/// impl StopCondition for BudgetExceeded {
///     async fn check(&self, state: &StopState<'_>) -> String {
///         if state.usage.total() > 100_000 {
///             "token budget exhausted".to_string()
///         } else {
///             String::new()
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait StopCondition: Send + Sync {
    /// Evaluates the condition against the current state.
    async fn check(&self, state: &StopState<'_>) -> String;
}

/// Stops once the step count reaches a limit.
#[derive(Debug, Clone)]
pub struct StepCountIs {
    step_count: usize,
}

#[async_trait]
impl StopCondition for StepCountIs {
    async fn check(&self, state: &StopState<'_>) -> String {
        if state.steps.len() >= self.step_count {
            format!("maximum number of steps ({}) reached", self.step_count)
        } else {
            String::new()
        }
    }
}

/// Creates a condition that stops once `step_count` steps have completed.
pub fn step_count_is(step_count: usize) -> StepCountIs {
    StepCountIs { step_count }
}

/// Stops when the last step called a specific tool.
#[derive(Debug, Clone)]
pub struct HasToolCall {
    tool_name: String,
}

#[async_trait]
impl StopCondition for HasToolCall {
    async fn check(&self, state: &StopState<'_>) -> String {
        let called = state
            .steps
            .last()
            .map(|step| {
                step.tool_calls
                    .iter()
                    .any(|call| call.tool_name == self.tool_name)
            })
            .unwrap_or(false);
        if called {
            format!("tool \"{}\" was called", self.tool_name)
        } else {
            String::new()
        }
    }
}

/// Creates a condition that stops when the last step called `tool_name`.
pub fn has_tool_call(tool_name: impl Into<String>) -> HasToolCall {
    HasToolCall {
        tool_name: tool_name.into(),
    }
}

/// Evaluates all conditions and returns the first non-empty reason.
///
/// Every condition is invoked each round; the winner is deterministic by
/// list order. An empty condition list never stops the loop by this path.
pub async fn first_stop_reason(
    conditions: &[Box<dyn StopCondition>],
    state: &StopState<'_>,
) -> Option<String> {
    let checks: Vec<_> = conditions
        .iter()
        .map(|condition| condition.check(state))
        .collect();
    let reasons = futures::future::join_all(checks).await;
    reasons.into_iter().find(|reason| !reason.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genloop_provider::{FinishReason, ToolCall};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn step_with_tools(step_number: usize, tool_names: &[&str]) -> StepResult {
        let tool_calls = tool_names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall::new(format!("call_{i}"), *name, json!({})))
            .collect();
        StepResult::new(
            step_number,
            "",
            tool_calls,
            vec![],
            FinishReason::ToolCalls,
            Usage::default(),
            vec![],
        )
    }

    fn state_of<'a>(steps: &'a [StepResult], usage: &'a Usage) -> StopState<'a> {
        StopState {
            steps,
            messages: &[],
            usage,
        }
    }

    #[tokio::test]
    async fn test_step_count_is() {
        let condition = step_count_is(3);
        let usage = Usage::default();

        let steps: Vec<StepResult> = (1..=3).map(|n| step_with_tools(n, &[])).collect();
        assert_eq!(
            condition.check(&state_of(&steps, &usage)).await,
            "maximum number of steps (3) reached"
        );
        assert_eq!(condition.check(&state_of(&steps[..2], &usage)).await, "");
        assert_eq!(condition.check(&state_of(&[], &usage)).await, "");
    }

    #[tokio::test]
    async fn test_step_count_fires_beyond_limit() {
        // >= semantics: already past the limit still stops.
        let condition = step_count_is(2);
        let usage = Usage::default();
        let steps: Vec<StepResult> = (1..=4).map(|n| step_with_tools(n, &[])).collect();
        assert!(!condition.check(&state_of(&steps, &usage)).await.is_empty());
    }

    #[tokio::test]
    async fn test_has_tool_call_checks_last_step_only() {
        let condition = has_tool_call("get_weather");
        let usage = Usage::default();

        let steps = vec![
            step_with_tools(1, &["get_weather"]),
            step_with_tools(2, &["other_tool"]),
        ];
        assert_eq!(condition.check(&state_of(&steps, &usage)).await, "");
        assert_eq!(
            condition.check(&state_of(&steps[..1], &usage)).await,
            "tool \"get_weather\" was called"
        );
    }

    #[tokio::test]
    async fn test_first_non_empty_reason_wins_by_order() {
        let conditions: Vec<Box<dyn StopCondition>> = vec![
            Box::new(has_tool_call("missing")),
            Box::new(step_count_is(1)),
            Box::new(step_count_is(0)),
        ];
        let usage = Usage::default();
        let steps = vec![step_with_tools(1, &[])];

        let reason = first_stop_reason(&conditions, &state_of(&steps, &usage)).await;
        // Both StepCountIs conditions fire; the earlier one in the list wins.
        assert_eq!(reason.as_deref(), Some("maximum number of steps (1) reached"));
    }

    #[tokio::test]
    async fn test_every_condition_is_invoked() {
        struct Counting {
            calls: Arc<AtomicUsize>,
            reason: &'static str,
        }

        #[async_trait]
        impl StopCondition for Counting {
            async fn check(&self, _state: &StopState<'_>) -> String {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.reason.to_string()
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let conditions: Vec<Box<dyn StopCondition>> = vec![
            Box::new(Counting { calls: calls.clone(), reason: "first" }),
            Box::new(Counting { calls: calls.clone(), reason: "second" }),
            Box::new(Counting { calls: calls.clone(), reason: "" }),
        ];
        let usage = Usage::default();
        let steps = vec![];

        let reason = first_stop_reason(&conditions, &state_of(&steps, &usage)).await;
        assert_eq!(reason.as_deref(), Some("first"));
        // All three ran even though the first already produced a reason.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_condition_list_never_stops() {
        let conditions: Vec<Box<dyn StopCondition>> = vec![];
        let usage = Usage::default();
        let steps = vec![step_with_tools(1, &[])];
        assert!(
            first_stop_reason(&conditions, &state_of(&steps, &usage))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_usage_based_custom_condition() {
        struct TokenBudget(u64);

        #[async_trait]
        impl StopCondition for TokenBudget {
            async fn check(&self, state: &StopState<'_>) -> String {
                if state.usage.total() > self.0 {
                    format!("token budget of {} exhausted", self.0)
                } else {
                    String::new()
                }
            }
        }

        let usage = Usage::new(50, 60);
        let steps = vec![];
        let conditions: Vec<Box<dyn StopCondition>> = vec![Box::new(TokenBudget(100))];
        let reason = first_stop_reason(&conditions, &state_of(&steps, &usage)).await;
        assert_eq!(reason.as_deref(), Some("token budget of 100 exhausted"));
    }
}
