use genloop_provider::{ContentPart, Message, ToolCall, ToolResult, ToolResultPart};
use serde_json::Value;

/// Builds the messages a completed step appends to the conversation.
///
/// One assistant message carries the step's raw text (if any) plus all
/// tool-call parts; it is followed by one tool message per completed tool
/// result. Pending provider-executed results produce no message - the
/// provider resolves them on its side.
pub fn step_response_messages(
    text: &str,
    tool_calls: &[ToolCall],
    tool_results: &[ToolResult],
) -> Vec<Message> {
    let mut messages = Vec::new();

    let mut parts: Vec<ContentPart> = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::text(text));
    }
    for call in tool_calls {
        parts.push(ContentPart::ToolCall(call.clone()));
    }
    if !parts.is_empty() {
        messages.push(Message::assistant(parts));
    }

    for result in tool_results {
        if result.is_pending() {
            continue;
        }
        let payload = result
            .output
            .clone()
            .or_else(|| result.error.clone())
            .unwrap_or(Value::Null);
        messages.push(Message::tool(
            ToolResultPart::new(&result.tool_call_id, &result.tool_name, payload)
                .with_is_error(result.is_error()),
        ));
    }

    messages
}
