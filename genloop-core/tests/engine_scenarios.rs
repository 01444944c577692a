//! End-to-end scenarios driving the public engine API against scripted
//! provider models.

use async_trait::async_trait;
use genloop_core::{
    GenerateText, Prompt, Tool, ToolSet, has_tool_call, step_count_is,
};
use genloop_provider::language_model::{BoxError, StreamResponse};
use genloop_provider::{
    CallOptions, ContentPart, FinishReason, GenerateResponse, LanguageModel, Role, ToolCall, Usage,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedModel {
    responses: Mutex<VecDeque<GenerateResponse>>,
    requests: Arc<Mutex<Vec<CallOptions>>>,
}

impl ScriptedModel {
    fn new(responses: Vec<GenerateResponse>) -> (Arc<Self>, Arc<Mutex<Vec<CallOptions>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let model = Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: requests.clone(),
        });
        (model, requests)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, options: CallOptions) -> Result<GenerateResponse, BoxError> {
        self.requests.lock().unwrap().push(options);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "script exhausted".into())
    }

    async fn stream(&self, _options: CallOptions) -> Result<StreamResponse, BoxError> {
        Err("scripted model does not stream".into())
    }
}

fn search_tools() -> ToolSet {
    ToolSet::new()
        .with_tool(
            Tool::new(
                "search",
                json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"],
                }),
            )
            .with_description("Searches the knowledge base")
            .with_execute(|input, _options| async move {
                Ok(json!({"query": input["query"], "hits": ["rust 1.0 shipped in 2015"]}))
            }),
        )
        .with_tool(
            Tool::new("final_answer", json!({"type": "object"}))
                .with_description("Reports the final answer")
                .with_execute(|input, _options| async move { Ok(input) }),
        )
}

#[tokio::test]
async fn agentic_run_threads_tool_results_through_history() {
    let (model, requests) = ScriptedModel::new(vec![
        GenerateResponse {
            text: "Let me look that up.".to_string(),
            tool_calls: vec![ToolCall::new(
                "call_1",
                "search",
                json!({"query": "rust 1.0 release year"}),
            )],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::new(12, 6),
            ..Default::default()
        },
        GenerateResponse {
            text: "Rust 1.0 shipped in 2015.".to_string(),
            finish_reason: FinishReason::Stop,
            usage: Usage::new(30, 9),
            ..Default::default()
        },
    ]);

    let result = GenerateText::new(model, Prompt::text("When did Rust 1.0 ship?"))
        .system("Answer with facts only")
        .tools(search_tools())
        .stop_when(vec![Box::new(step_count_is(4))])
        .execute()
        .await
        .unwrap();

    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.text, "Rust 1.0 shipped in 2015.");
    assert_eq!(result.total_usage, Usage::new(42, 15));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);

    // Both requests carry the system instructions outside the messages.
    for request in requests.iter() {
        assert_eq!(request.system.as_deref(), Some("Answer with facts only"));
        assert!(request.messages.iter().all(|m| m.role != Role::System));
    }

    // The second request extends the first with the assistant tool-call
    // message and the tool-result message.
    assert_eq!(requests[0].messages.len(), 1);
    let followup = &requests[1].messages;
    assert_eq!(followup.len(), 3);
    assert_eq!(followup[0].role, Role::User);
    assert_eq!(followup[1].role, Role::Assistant);
    assert!(followup[1]
        .content
        .iter()
        .any(|part| matches!(part, ContentPart::ToolCall(call) if call.tool_name == "search")));
    assert_eq!(followup[2].role, Role::Tool);
    match &followup[2].content[0] {
        ContentPart::ToolResult(part) => {
            assert_eq!(part.tool_call_id, "call_1");
            assert!(!part.is_error);
            assert_eq!(part.output["hits"][0], "rust 1.0 shipped in 2015");
        }
        other => panic!("expected tool result part, got {other:?}"),
    }
}

#[tokio::test]
async fn has_tool_call_ends_the_loop_with_a_reason() {
    let (model, _requests) = ScriptedModel::new(vec![
        GenerateResponse {
            tool_calls: vec![ToolCall::new("call_1", "search", json!({"query": "q"}))],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::new(1, 1),
            ..Default::default()
        },
        GenerateResponse {
            tool_calls: vec![ToolCall::new("call_2", "final_answer", json!({"answer": 42}))],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::new(1, 1),
            ..Default::default()
        },
    ]);

    let result = GenerateText::new(model, Prompt::text("answer me"))
        .tools(search_tools())
        .stop_when(vec![
            Box::new(has_tool_call("final_answer")),
            Box::new(step_count_is(10)),
        ])
        .execute()
        .await
        .unwrap();

    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.stop_reason, "tool \"final_answer\" was called");
    // The terminating tool still ran.
    assert_eq!(
        result.steps[1].tool_results[0].output,
        Some(json!({"answer": 42}))
    );
}
