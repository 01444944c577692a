//! Streaming text generation.
//!
//! [`StreamText`] starts the provider's chunk stream and hands it to a
//! single worker task: the aggregator. The worker demultiplexes chunks,
//! maintains running text and usage, re-parses partial output on every
//! text delta, enforces the per-chunk deadline, and synthesizes one step
//! at EOF. Tool calls are buffered, never executed mid-stream.

/// Result surface of a running stream.
pub mod stream_text_result;

pub use stream_text_result::{AsyncIterableStream, StreamStatus, StreamTextResult};

use crate::error::{EngineError, TimeoutScope};
use crate::events::{
    EventListeners, FinishEvent, StartEvent, StepFinishEvent, StepStartEvent, listener, notify,
};
use crate::output::OutputSpec;
use crate::prompt::call_settings::{
    CallSettings, RetentionConfig, TimeoutConfig, prepare_call_settings,
};
use crate::prompt::{Prompt, validate_and_standardize};
use crate::stream_text::stream_text_result::{StreamState, lock_state};
use crate::tool::ToolSet;
use crate::generate_text::step_result::StepResult;
use futures_util::StreamExt;
use genloop_provider::language_model::ChunkStream;
use genloop_provider::{
    CallOptions, LanguageModel, ProviderOptions, ResponseFormat, StreamChunk, ToolResult,
};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Capacity of the chunk channel re-exposed to callers.
const CHUNK_CHANNEL_CAPACITY: usize = 10;

/// Builder for streaming text generation.
///
/// # Examples
///
/// ```no_run
/// use genloop_core::{Prompt, StreamText};
/// use std::sync::Arc;
/// # use genloop_provider::LanguageModel;
/// # async fn example(model: Arc<dyn LanguageModel>) -> Result<(), Box<dyn std::error::Error>> {
/// let result = StreamText::new(model, Prompt::text("Tell me a story"))
///     .temperature(0.8)
///     .execute()
///     .await?;
///
/// let story = result.read_all().await;
/// println!("{story}");
/// # Ok(())
/// # }
/// ```
pub struct StreamText {
    model: Arc<dyn LanguageModel>,
    prompt: Prompt,
    settings: CallSettings,
    tools: Option<ToolSet>,
    tool_choice: Option<genloop_provider::ToolChoice>,
    output: Option<OutputSpec>,
    response_format: Option<ResponseFormat>,
    timeouts: TimeoutConfig,
    retention: RetentionConfig,
    provider_options: Option<ProviderOptions>,
    experimental_context: Option<Value>,
    listeners: EventListeners,
}

impl StreamText {
    /// Creates a builder with the required model and prompt.
    pub fn new(model: Arc<dyn LanguageModel>, prompt: impl Into<Prompt>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            settings: CallSettings::default(),
            tools: None,
            tool_choice: None,
            output: None,
            response_format: None,
            timeouts: TimeoutConfig::default(),
            retention: RetentionConfig::default(),
            provider_options: None,
            experimental_context: None,
            listeners: EventListeners::default(),
        }
    }

    /// Sets the complete call settings.
    pub fn settings(mut self, settings: CallSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the system instructions.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.prompt.system = Some(system.into());
        self
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.settings = self.settings.with_temperature(temperature);
        self
    }

    /// Sets the maximum output tokens.
    pub fn max_output_tokens(mut self, max_tokens: u32) -> Self {
        self.settings = self.settings.with_max_output_tokens(max_tokens);
        self
    }

    /// Sets the top_p sampling parameter.
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.settings = self.settings.with_top_p(top_p);
        self
    }

    /// Sets the top_k sampling parameter.
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.settings = self.settings.with_top_k(top_k);
        self
    }

    /// Sets the presence penalty.
    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.settings = self.settings.with_presence_penalty(penalty);
        self
    }

    /// Sets the frequency penalty.
    pub fn frequency_penalty(mut self, penalty: f64) -> Self {
        self.settings = self.settings.with_frequency_penalty(penalty);
        self
    }

    /// Sets the stop sequences.
    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.settings = self.settings.with_stop_sequences(sequences);
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, seed: u32) -> Self {
        self.settings = self.settings.with_seed(seed);
        self
    }

    /// Sets additional HTTP headers.
    pub fn headers(mut self, headers: genloop_provider::Headers) -> Self {
        self.settings = self.settings.with_headers(headers);
        self
    }

    /// Sets the cancellation signal.
    pub fn abort_signal(mut self, signal: CancellationToken) -> Self {
        self.settings = self.settings.with_abort_signal(signal);
        self
    }

    /// Sets the tool registry; definitions are forwarded to the provider
    /// and buffered calls are classified by locality, but tools are not
    /// executed inside a stream.
    pub fn tools(mut self, tools: ToolSet) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Sets the tool choice strategy.
    pub fn tool_choice(mut self, choice: genloop_provider::ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Sets the output specification; enables partial-output parsing and,
    /// for Array outputs, element streaming.
    pub fn output(mut self, output: OutputSpec) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets a raw response format (legacy alternative to `output`).
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Sets the deadline configuration. `per_chunk` bounds each chunk
    /// read; `total` bounds the whole stream.
    pub fn timeout(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets which raw payloads are retained on the result.
    pub fn retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Sets namespaced provider options, passed through verbatim.
    pub fn provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider_options = Some(options);
        self
    }

    /// Sets an opaque value threaded to listeners.
    pub fn experimental_context(mut self, context: Value) -> Self {
        self.experimental_context = Some(context);
        self
    }

    /// Registers an `on_start` listener.
    pub fn on_start<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(StartEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_start.push(listener(callback));
        self
    }

    /// Registers an `on_step_start` listener.
    pub fn on_step_start<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(StepStartEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_step_start.push(listener(callback));
        self
    }

    /// Registers an `on_step_finish` listener.
    pub fn on_step_finish<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(StepFinishEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_step_finish.push(listener(callback));
        self
    }

    /// Registers an `on_finish` listener.
    pub fn on_finish<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(FinishEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_finish.push(listener(callback));
        self
    }

    /// Starts the stream and returns its result surface.
    pub async fn execute(self) -> Result<StreamTextResult, EngineError> {
        let StreamText {
            model,
            prompt,
            settings,
            tools,
            tool_choice,
            output,
            response_format,
            timeouts,
            retention,
            provider_options,
            experimental_context,
            listeners,
        } = self;

        if output.is_some() && response_format.is_some() {
            return Err(EngineError::invalid_argument(
                "responseFormat",
                "set",
                "responseFormat cannot be combined with an output specification",
            ));
        }
        if let Some(tool_set) = &tools {
            for tool in tool_set.iter() {
                if tool.is_local() && tool.execute.is_none() {
                    return Err(EngineError::invalid_argument(
                        "tools",
                        &tool.name,
                        "locally-executed tool must have an execute handler",
                    ));
                }
            }
        }

        let prepared = prepare_call_settings(&settings)?;
        let standardized = validate_and_standardize(prompt)?;
        let resolved_format = match &output {
            Some(spec) => Some(spec.response_format()),
            None => response_format,
        };

        let mut call_options = CallOptions::new(standardized.messages.clone());
        if let Some(system) = &standardized.system {
            call_options = call_options.with_system(system.clone());
        }
        if let Some(tokens) = prepared.max_output_tokens {
            call_options = call_options.with_max_output_tokens(tokens);
        }
        if let Some(temperature) = prepared.temperature {
            call_options = call_options.with_temperature(temperature);
        }
        if let Some(top_p) = prepared.top_p {
            call_options = call_options.with_top_p(top_p);
        }
        if let Some(top_k) = prepared.top_k {
            call_options = call_options.with_top_k(top_k);
        }
        if let Some(penalty) = prepared.presence_penalty {
            call_options = call_options.with_presence_penalty(penalty);
        }
        if let Some(penalty) = prepared.frequency_penalty {
            call_options = call_options.with_frequency_penalty(penalty);
        }
        if let Some(sequences) = &prepared.stop_sequences {
            call_options = call_options.with_stop_sequences(sequences.clone());
        }
        if let Some(seed) = prepared.seed {
            call_options = call_options.with_seed(seed);
        }
        if let Some(tool_set) = &tools {
            call_options = call_options.with_tools(tool_set.definitions());
        }
        if let Some(choice) = &tool_choice {
            call_options = call_options.with_tool_choice(choice.clone());
        }
        if let Some(format) = &resolved_format {
            call_options = call_options.with_response_format(format.clone());
        }
        if let Some(headers) = &settings.headers {
            call_options = call_options.with_headers(headers.clone());
        }
        if let Some(options) = &provider_options {
            call_options = call_options.with_provider_options(options.clone());
        }
        if let Some(signal) = &settings.abort_signal {
            call_options = call_options.with_abort_signal(signal.clone());
        }

        let stream_response = model.stream(call_options).await.map_err(|e| {
            EngineError::provider(model.provider().to_string(), 1, e.to_string())
        })?;

        let state = Arc::new(Mutex::new(StreamState::default()));
        {
            let mut guard = lock_state(&state);
            if retention.raw_request {
                guard.raw_request = stream_response
                    .request
                    .as_ref()
                    .and_then(|r| r.body.clone());
            }
            if retention.raw_response {
                guard.raw_response = stream_response
                    .response
                    .as_ref()
                    .and_then(|r| r.body.clone());
            }
        }

        let (status_tx, status_rx) = watch::channel(StreamStatus::Submitted);
        let (chunks_tx, chunks_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (elements_tx, elements_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = Worker {
            stream: stream_response.stream,
            provider: model.provider().to_string(),
            state: state.clone(),
            status_tx,
            chunks_tx,
            elements_tx,
            cancel: cancel.clone(),
            abort: settings.abort_signal.clone(),
            per_chunk: timeouts.per_chunk,
            total: timeouts.total,
            output,
            tools,
            listeners,
            start_event: StartEvent {
                system: standardized.system.clone(),
                messages: standardized.messages.clone(),
                experimental_context,
            },
            was_closed: false,
        };
        tokio::spawn(worker.run());

        Ok(StreamTextResult::new(
            state,
            status_rx,
            chunks_rx,
            elements_rx,
            cancel,
        ))
    }
}

enum ReadOutcome {
    Item(Option<Result<StreamChunk, genloop_provider::language_model::BoxError>>),
    TimedOut,
    Closed,
    Aborted,
}

async fn wait_abort(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

/// The aggregator: the single cooperative worker that owns the provider
/// stream and mutates the shared state.
struct Worker {
    stream: ChunkStream,
    provider: String,
    state: Arc<Mutex<StreamState>>,
    status_tx: watch::Sender<StreamStatus>,
    chunks_tx: mpsc::Sender<StreamChunk>,
    elements_tx: mpsc::UnboundedSender<(usize, Value)>,
    cancel: CancellationToken,
    abort: Option<CancellationToken>,
    per_chunk: Option<Duration>,
    total: Option<Duration>,
    output: Option<OutputSpec>,
    tools: Option<ToolSet>,
    listeners: EventListeners,
    start_event: StartEvent,
    was_closed: bool,
}

impl Worker {
    async fn run(mut self) {
        notify(&self.listeners.on_start, &self.start_event).await;
        notify(
            &self.listeners.on_step_start,
            &StepStartEvent {
                step_number: 1,
                messages: self.start_event.messages.clone(),
            },
        )
        .await;

        match self.total {
            Some(limit) => {
                if tokio::time::timeout(limit, self.consume()).await.is_err() {
                    let mut state = lock_state(&self.state);
                    if state.error.is_none() {
                        state.error = Some(EngineError::timeout(TimeoutScope::Total));
                    }
                }
            }
            None => self.consume().await,
        }

        self.finalize().await;
    }

    async fn consume(&mut self) {
        let mut forward = true;
        let mut first = true;

        loop {
            let outcome = {
                let next = self.stream.next();
                let per_chunk = self.per_chunk;
                // A fresh deadline per chunk read.
                let guarded = async {
                    match per_chunk {
                        Some(limit) => match tokio::time::timeout(limit, next).await {
                            Ok(item) => ReadOutcome::Item(item),
                            Err(_) => ReadOutcome::TimedOut,
                        },
                        None => ReadOutcome::Item(next.await),
                    }
                };
                tokio::select! {
                    _ = self.cancel.cancelled() => ReadOutcome::Closed,
                    _ = wait_abort(self.abort.as_ref()) => ReadOutcome::Aborted,
                    outcome = guarded => outcome,
                }
            };

            match outcome {
                ReadOutcome::Closed => {
                    self.was_closed = true;
                    break;
                }
                ReadOutcome::Aborted => {
                    lock_state(&self.state).error = Some(EngineError::Cancelled);
                    break;
                }
                ReadOutcome::TimedOut => {
                    lock_state(&self.state).error =
                        Some(EngineError::timeout(TimeoutScope::PerChunk));
                    break;
                }
                ReadOutcome::Item(None) => break,
                ReadOutcome::Item(Some(Err(error))) => {
                    lock_state(&self.state).error = Some(EngineError::provider(
                        self.provider.clone(),
                        1,
                        error.to_string(),
                    ));
                    break;
                }
                ReadOutcome::Item(Some(Ok(chunk))) => {
                    if first {
                        let _ = self.status_tx.send(StreamStatus::Streaming);
                        first = false;
                    }
                    self.apply(&chunk);
                    if forward {
                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                self.was_closed = true;
                                break;
                            }
                            sent = self.chunks_tx.send(chunk) => {
                                if sent.is_err() {
                                    // Consumer went away; keep aggregating.
                                    forward = false;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn apply(&self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::TextDelta { delta } => {
                let fresh = {
                    let mut state = lock_state(&self.state);
                    state.text.push_str(delta);
                    self.refresh_output(&mut state)
                };
                for element in fresh {
                    let _ = self.elements_tx.send(element);
                }
            }
            StreamChunk::Usage { usage } => {
                let mut state = lock_state(&self.state);
                state.usage = state.usage.add(usage);
            }
            StreamChunk::Finish {
                finish_reason,
                context_management,
            } => {
                let mut state = lock_state(&self.state);
                state.finish_reason = *finish_reason;
                state.saw_finish = true;
                state.context_management = context_management.clone();
            }
            StreamChunk::Warning { warning } => {
                lock_state(&self.state).warnings.push(warning.clone());
            }
            StreamChunk::ToolCall { tool_call } => {
                lock_state(&self.state).tool_calls.push(tool_call.clone());
            }
        }
    }

    /// Re-parses partial output and advances the element cursor.
    /// Returns the newly available elements, tagged with their index.
    fn refresh_output(&self, state: &mut StreamState) -> Vec<(usize, Value)> {
        let Some(spec) = &self.output else {
            return Vec::new();
        };

        if let Some(partial) = spec.parse_partial(&state.text)
            && state.partial_output.as_ref() != Some(&partial)
        {
            state.partial_output = Some(partial);
        }

        let mut fresh = Vec::new();
        if matches!(spec, OutputSpec::Array { .. }) {
            let elements = spec.partial_elements(&state.text);
            while state.element_cursor < elements.len() {
                fresh.push((
                    state.element_cursor,
                    elements[state.element_cursor].clone(),
                ));
                state.element_cursor += 1;
            }
        }
        fresh
    }

    async fn finalize(self) {
        let step = {
            let mut state = lock_state(&self.state);

            if state.error.is_none() && !state.saw_finish && !self.was_closed {
                state.error = Some(EngineError::stream_protocol(
                    "stream ended without a terminal finish chunk",
                ));
            }

            if let Some(spec) = &self.output
                && state.error.is_none()
                && !self.was_closed
            {
                // The closing delta may have completed the wrapper array.
                let fresh = self.refresh_output(&mut state);
                for element in fresh {
                    let _ = self.elements_tx.send(element);
                }
                match spec.parse_complete(&state.text) {
                    Ok(value) => state.final_output = Some(value),
                    Err(parse_error) => {
                        state.error = Some(EngineError::no_object_generated(
                            parse_error.to_string(),
                            state.text.clone(),
                            state.usage.clone(),
                            state.finish_reason,
                            None,
                        ));
                    }
                }
            }

            // One synthesized step; tools are not executed mid-stream, so
            // only provider-executed calls get (pending) results.
            let tool_results: Vec<ToolResult> = state
                .tool_calls
                .iter()
                .filter(|call| {
                    call.provider_executed.unwrap_or_else(|| {
                        self.tools
                            .as_ref()
                            .and_then(|tool_set| tool_set.get(&call.tool_name))
                            .map(|tool| !tool.is_local())
                            .unwrap_or(false)
                    })
                })
                .map(|call| ToolResult::pending(&call.tool_call_id, &call.tool_name))
                .collect();

            let step = StepResult::new(
                1,
                state.text.clone(),
                state.tool_calls.clone(),
                tool_results,
                state.finish_reason,
                state.usage.clone(),
                state.warnings.clone(),
            );
            state.step = Some(step.clone());
            step
        };

        notify(
            &self.listeners.on_step_finish,
            &StepFinishEvent { step: step.clone() },
        )
        .await;
        notify(
            &self.listeners.on_finish,
            &FinishEvent {
                text: step.text.clone(),
                finish_reason: step.finish_reason,
                total_usage: step.usage.clone(),
                steps: vec![step],
                stop_reason: String::new(),
            },
        )
        .await;

        let _ = self.status_tx.send(StreamStatus::Done);
        // Dropping the worker closes the chunk and element channels.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use genloop_provider::language_model::{BoxError, GenerateResponse, StreamResponse};
    use genloop_provider::{FinishReason, ToolCall, Usage};
    use serde_json::json;

    /// A model that replays a fixed list of chunks.
    struct ChunkModel {
        chunks: Mutex<Option<Vec<Result<StreamChunk, BoxError>>>>,
    }

    impl ChunkModel {
        fn new(chunks: Vec<Result<StreamChunk, BoxError>>) -> Arc<Self> {
            Arc::new(Self {
                chunks: Mutex::new(Some(chunks)),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ChunkModel {
        fn provider(&self) -> &str {
            "test-provider"
        }

        fn model_id(&self) -> &str {
            "test-model"
        }

        async fn generate(&self, _options: CallOptions) -> Result<GenerateResponse, BoxError> {
            Err("chunk model does not generate".into())
        }

        async fn stream(&self, _options: CallOptions) -> Result<StreamResponse, BoxError> {
            let chunks = self
                .chunks
                .lock()
                .unwrap()
                .take()
                .ok_or("stream already consumed")?;
            Ok(StreamResponse {
                stream: Box::new(futures_util::stream::iter(chunks)),
                request: None,
                response: None,
            })
        }
    }

    fn color_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name", "hex"],
            "properties": {
                "name": {"type": "string"},
                "hex": {"type": "string"},
            },
        })
    }

    #[tokio::test]
    async fn test_read_all_accumulates_text() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta("hel")),
            Ok(StreamChunk::text_delta("lo")),
            Ok(StreamChunk::Usage {
                usage: Usage::new(3, 2),
            }),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .execute()
            .await
            .unwrap();
        let text = result.read_all().await;

        assert_eq!(text, "hello");
        assert_eq!(result.text(), text);
        assert_eq!(result.finish_reason(), FinishReason::Stop);
        assert_eq!(result.usage(), Usage::new(3, 2));
        assert_eq!(result.status(), StreamStatus::Done);
        assert!(result.err().is_none());

        let step = result.step().unwrap();
        assert_eq!(step.step_number, 1);
        assert_eq!(step.text, "hello");
    }

    #[tokio::test]
    async fn test_usage_chunks_combine_monoidally() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::Usage {
                usage: Usage {
                    input_tokens: Some(5),
                    ..Default::default()
                },
            }),
            Ok(StreamChunk::text_delta("x")),
            Ok(StreamChunk::Usage {
                usage: Usage {
                    output_tokens: Some(7),
                    ..Default::default()
                },
            }),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        let usage = result.usage();
        assert_eq!(usage.input_tokens, Some(5));
        assert_eq!(usage.output_tokens, Some(7));
        assert_eq!(usage.total_tokens, None);
    }

    #[tokio::test]
    async fn test_event_order_for_stream() {
        let events = Arc::new(Mutex::new(Vec::new()));

        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta("hi")),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let e1 = events.clone();
        let e2 = events.clone();
        let e3 = events.clone();
        let e4 = events.clone();
        let result = StreamText::new(model, Prompt::text("hi"))
            .on_start(move |_event| {
                let e = e1.clone();
                async move { e.lock().unwrap().push("start") }
            })
            .on_step_start(move |_event| {
                let e = e2.clone();
                async move { e.lock().unwrap().push("step_start") }
            })
            .on_step_finish(move |_event| {
                let e = e3.clone();
                async move { e.lock().unwrap().push("step_finish") }
            })
            .on_finish(move |_event| {
                let e = e4.clone();
                async move { e.lock().unwrap().push("finish") }
            })
            .execute()
            .await
            .unwrap();

        result.read_all().await;
        assert_eq!(
            *events.lock().unwrap(),
            vec!["start", "step_start", "step_finish", "finish"]
        );
    }

    // S6: element streaming over four text chunks.
    #[tokio::test]
    async fn test_element_streaming() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta(
                r##"{"elements":[{"name":"red","hex":"#ff0000"}"##,
            )),
            Ok(StreamChunk::text_delta(r#",{"name":"blue","#)),
            Ok(StreamChunk::text_delta(r##""hex":"#0000ff"}"##)),
            Ok(StreamChunk::text_delta("]}")),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let result = StreamText::new(model, Prompt::text("colors"))
            .output(OutputSpec::array(color_schema()))
            .execute()
            .await
            .unwrap();

        result.read_all().await;
        let elements: Vec<(usize, Value)> = result.element_stream().collect().await;

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].0, 0);
        assert_eq!(elements[0].1, json!({"name": "red", "hex": "#ff0000"}));
        assert_eq!(elements[1].0, 1);
        assert_eq!(elements[1].1, json!({"name": "blue", "hex": "#0000ff"}));
        assert_eq!(result.status(), StreamStatus::Done);

        // The complete output is the unwrapped element array.
        assert_eq!(
            result.output(),
            Some(json!([
                {"name": "red", "hex": "#ff0000"},
                {"name": "blue", "hex": "#0000ff"},
            ]))
        );
    }

    #[tokio::test]
    async fn test_partial_output_is_published() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta(r#"{"name": "Ear"#)),
            Ok(StreamChunk::text_delta(r#"th", "moons": 1}"#)),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let result = StreamText::new(model, Prompt::text("earth"))
            .output(OutputSpec::object(json!({"type": "object"})))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        assert_eq!(
            result.partial_output(),
            Some(json!({"name": "Earth", "moons": 1}))
        );
        assert_eq!(result.output(), Some(json!({"name": "Earth", "moons": 1})));
    }

    #[tokio::test]
    async fn test_missing_finish_is_a_protocol_error() {
        let model = ChunkModel::new(vec![Ok(StreamChunk::text_delta("partial"))]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        assert!(matches!(
            result.err(),
            Some(EngineError::StreamProtocol { .. })
        ));
        // Accumulated data stays queryable.
        assert_eq!(result.text(), "partial");
    }

    #[tokio::test]
    async fn test_mid_stream_provider_error() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta("some ")),
            Err("connection reset".into()),
        ]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        match result.err() {
            Some(EngineError::Provider { message, .. }) => {
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
        assert_eq!(result.text(), "some ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_chunk_deadline_keeps_accumulated_state() {
        let stream = async_stream::stream! {
            yield Ok(StreamChunk::text_delta("before the stall"));
            tokio::time::sleep(Duration::from_secs(600)).await;
            yield Ok(StreamChunk::finish(FinishReason::Stop));
        };

        struct StallingModel {
            stream: Mutex<Option<ChunkStream>>,
        }

        #[async_trait]
        impl LanguageModel for StallingModel {
            fn provider(&self) -> &str {
                "stalling"
            }
            fn model_id(&self) -> &str {
                "stalling-model"
            }
            async fn generate(&self, _options: CallOptions) -> Result<GenerateResponse, BoxError> {
                Err("no generate".into())
            }
            async fn stream(&self, _options: CallOptions) -> Result<StreamResponse, BoxError> {
                Ok(StreamResponse {
                    stream: self.stream.lock().unwrap().take().ok_or("consumed")?,
                    request: None,
                    response: None,
                })
            }
        }

        let model = Arc::new(StallingModel {
            stream: Mutex::new(Some(Box::new(Box::pin(stream)))),
        });

        let result = StreamText::new(model, Prompt::text("hi"))
            .timeout(TimeoutConfig::new().with_per_chunk(Duration::from_millis(50)))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        assert!(matches!(
            result.err(),
            Some(EngineError::Timeout {
                scope: TimeoutScope::PerChunk
            })
        ));
        assert_eq!(result.text(), "before the stall");
        assert_eq!(result.status(), StreamStatus::Done);
    }

    #[tokio::test]
    async fn test_tool_calls_are_buffered_not_executed() {
        use crate::tool::Tool;

        let tools = ToolSet::new()
            .with_tool(
                Tool::new("calc", json!({}))
                    .with_execute(|_input, _options| async move { Ok(json!("4")) }),
            )
            .with_tool(Tool::provider_executed("web_search", json!({})));

        let model = ChunkModel::new(vec![
            Ok(StreamChunk::ToolCall {
                tool_call: ToolCall::new("call_1", "calc", json!({})),
            }),
            Ok(StreamChunk::ToolCall {
                tool_call: ToolCall::new("call_2", "web_search", json!({})),
            }),
            Ok(StreamChunk::finish(FinishReason::ToolCalls)),
        ]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .tools(tools)
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        let step = result.step().unwrap();
        assert_eq!(step.tool_calls.len(), 2);
        // No execution: only the provider-executed call has a (pending)
        // result.
        assert_eq!(step.tool_results.len(), 1);
        assert_eq!(step.tool_results[0].tool_call_id, "call_2");
        assert!(step.tool_results[0].is_pending());
        assert_eq!(result.finish_reason(), FinishReason::ToolCalls);
    }

    #[tokio::test]
    async fn test_chunks_are_forwarded_in_order() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta("a")),
            Ok(StreamChunk::text_delta("b")),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .execute()
            .await
            .unwrap();
        let chunks: Vec<StreamChunk> = result.chunks().collect().await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], StreamChunk::text_delta("a"));
        assert_eq!(chunks[1], StreamChunk::text_delta("b"));
        assert!(chunks[2].is_finish());

        result.wait().await;
        assert_eq!(result.status(), StreamStatus::Done);
    }

    #[tokio::test]
    async fn test_resume_on_done_stream() {
        let model = ChunkModel::new(vec![Ok(StreamChunk::finish(FinishReason::Stop))]);
        let result = StreamText::new(model, Prompt::text("hi"))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        assert_eq!(result.status(), StreamStatus::Done);
        assert!(result.resume().is_err());
        assert_eq!(result.status(), StreamStatus::Done);
    }

    #[tokio::test]
    async fn test_no_object_generated_on_stream() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta("not json")),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let result = StreamText::new(model, Prompt::text("hi"))
            .output(OutputSpec::object(json!({"type": "object"})))
            .execute()
            .await
            .unwrap();
        result.read_all().await;

        assert!(matches!(
            result.err(),
            Some(EngineError::NoObjectGenerated { .. })
        ));
    }
}
