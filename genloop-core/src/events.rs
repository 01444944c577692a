//! Lifecycle events and their panic-isolated dispatcher.
//!
//! The engine fans six ordered events out to registered listeners:
//! `on_start`, `on_step_start`, `on_tool_call_start`, `on_tool_call_finish`,
//! `on_step_finish`, `on_finish`. Listeners receive snapshot structs and
//! must not mutate engine state. Invocation is serial in registration
//! order, and a panicking listener is caught and discarded so the next
//! listener still runs and the engine never aborts because of a listener
//! fault.

use crate::generate_text::step_result::StepResult;
use futures::FutureExt;
use genloop_provider::{FinishReason, Message, ToolCall, Usage};
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

/// The boxed future a listener returns.
pub type EventFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// An async lifecycle listener for events of type `E`.
pub type EventListener<E> = Arc<dyn Fn(E) -> EventFuture + Send + Sync>;

/// Wraps an async closure into an [`EventListener`].
pub fn listener<E, F, Fut>(callback: F) -> EventListener<E>
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(callback(event)))
}

/// Emitted once before the first step.
#[derive(Debug, Clone)]
pub struct StartEvent {
    /// The system instructions of the operation.
    pub system: Option<String>,

    /// The initial conversation history.
    pub messages: Vec<Message>,

    /// Opaque caller context from the entry options.
    pub experimental_context: Option<Value>,
}

/// Emitted at the beginning of each step.
#[derive(Debug, Clone)]
pub struct StepStartEvent {
    /// 1-based number of the starting step.
    pub step_number: usize,

    /// The messages the step will send to the provider.
    pub messages: Vec<Message>,
}

/// Emitted before a locally-executed tool call runs.
#[derive(Debug, Clone)]
pub struct ToolCallStartEvent {
    /// The step the call belongs to.
    pub step_number: usize,

    /// The call about to execute.
    pub tool_call: ToolCall,
}

/// Emitted after a locally-executed tool call completes.
///
/// Exactly one of `output` / `error` is populated.
#[derive(Debug, Clone)]
pub struct ToolCallFinishEvent {
    /// The step the call belongs to.
    pub step_number: usize,

    /// The id of the finished call.
    pub tool_call_id: String,

    /// The name of the tool.
    pub tool_name: String,

    /// The result value on success.
    pub output: Option<Value>,

    /// The error value on failure.
    pub error: Option<Value>,

    /// Wall-clock duration of the execution, in milliseconds.
    pub duration_ms: u64,
}

/// Emitted after each step completes.
#[derive(Debug, Clone)]
pub struct StepFinishEvent {
    /// The completed step.
    pub step: StepResult,
}

/// Emitted once after the final step.
#[derive(Debug, Clone)]
pub struct FinishEvent {
    /// The text of the final step.
    pub text: String,

    /// The finish reason of the final step.
    pub finish_reason: FinishReason,

    /// Usage summed over all steps.
    pub total_usage: Usage,

    /// All steps of the run.
    pub steps: Vec<StepResult>,

    /// The stop-condition reason, or empty for a natural stop.
    pub stop_reason: String,
}

/// The listener registrations of one operation, per event.
#[derive(Clone, Default)]
pub struct EventListeners {
    /// Listeners for [`StartEvent`].
    pub on_start: Vec<EventListener<StartEvent>>,
    /// Listeners for [`StepStartEvent`].
    pub on_step_start: Vec<EventListener<StepStartEvent>>,
    /// Listeners for [`ToolCallStartEvent`].
    pub on_tool_call_start: Vec<EventListener<ToolCallStartEvent>>,
    /// Listeners for [`ToolCallFinishEvent`].
    pub on_tool_call_finish: Vec<EventListener<ToolCallFinishEvent>>,
    /// Listeners for [`StepFinishEvent`].
    pub on_step_finish: Vec<EventListener<StepFinishEvent>>,
    /// Listeners for [`FinishEvent`].
    pub on_finish: Vec<EventListener<FinishEvent>>,
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("on_start", &self.on_start.len())
            .field("on_step_start", &self.on_step_start.len())
            .field("on_tool_call_start", &self.on_tool_call_start.len())
            .field("on_tool_call_finish", &self.on_tool_call_finish.len())
            .field("on_step_finish", &self.on_step_finish.len())
            .field("on_finish", &self.on_finish.len())
            .finish()
    }
}

/// Invokes each listener serially, in registration order.
///
/// A panic in a listener (while building or awaiting its future) is caught
/// and logged; the remaining listeners still run.
pub async fn notify<E: Clone>(listeners: &[EventListener<E>], event: &E) {
    for listener in listeners {
        let built = std::panic::catch_unwind(AssertUnwindSafe(|| listener(event.clone())));
        let future = match built {
            Ok(future) => future,
            Err(_) => {
                log::warn!("lifecycle listener panicked; continuing");
                continue;
            }
        };
        if AssertUnwindSafe(future).catch_unwind().await.is_err() {
            log::warn!("lifecycle listener panicked; continuing");
        }
    }
}
