use super::{Tool, ToolExecuteOptions};
use genloop_provider::{ToolCall, ToolResult};
use serde_json::json;
use std::time::Instant;

/// Executes one locally-executed tool call and records the outcome.
///
/// The handler's `Err` value is wrapped as a tool-execution failure and
/// encoded in `ToolResult.error`; it does not end the operation. The
/// returned result always carries the measured `duration_ms`.
///
/// The caller is responsible for locality dispatch: this function must
/// only be invoked for tools with a handler.
pub async fn execute_tool_call(
    tool: &Tool,
    call: &ToolCall,
    options: ToolExecuteOptions,
) -> ToolResult {
    let started = Instant::now();

    let outcome = match &tool.execute {
        Some(handler) => handler(call.input.clone(), options).await,
        // Guarded at option validation; kept as a recoverable fault so a
        // handler-less tool can never take the whole operation down.
        None => Err(json!({
            "message": format!("tool '{}' has no execute handler", call.tool_name),
        })),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            ToolResult::success(&call.tool_call_id, &call.tool_name, output)
                .with_duration_ms(duration_ms)
        }
        Err(cause) => ToolResult::failure(
            &call.tool_call_id,
            &call.tool_name,
            json!({
                "toolCallId": call.tool_call_id,
                "toolName": call.tool_name,
                "providerExecuted": false,
                "cause": cause,
            }),
        )
        .with_duration_ms(duration_ms),
    }
}

/// Builds the error value recorded when a tool call names no registered
/// tool. The loop continues with this error in history.
pub fn tool_not_found_result(call: &ToolCall, available: &[String]) -> ToolResult {
    ToolResult::failure(
        &call.tool_call_id,
        &call.tool_name,
        json!({
            "message": format!(
                "tool '{}' not found; available tools: {}",
                call.tool_name,
                available.join(", "),
            ),
        }),
    )
}
