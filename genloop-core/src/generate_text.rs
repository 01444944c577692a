//! Multi-step text generation.
//!
//! [`GenerateText`] drives the engine's step machine: build a request, call
//! the provider, execute any locally-executed tool calls, extend the
//! conversation, evaluate stop conditions, repeat. The caller sees a single
//! synchronous-looking future that resolves to a [`GenerateTextResult`].

/// Result type for multi-step generation.
pub mod generate_text_result;
/// Message construction from completed steps.
pub mod response_messages;
/// Retry policy for provider calls.
pub mod retries;
/// Step result type.
pub mod step_result;
/// Stop conditions for the multi-step loop.
pub mod stop_condition;

pub use generate_text_result::GenerateTextResult;
pub use response_messages::step_response_messages;
pub use retries::{RetryConfig, prepare_retries};
pub use step_result::StepResult;
pub use stop_condition::{
    HasToolCall, StepCountIs, StopCondition, StopState, first_stop_reason, has_tool_call,
    step_count_is,
};

use crate::error::{EngineError, TimeoutScope};
use crate::events::{
    EventListeners, FinishEvent, StartEvent, StepFinishEvent, StepStartEvent, ToolCallFinishEvent,
    ToolCallStartEvent, listener, notify,
};
use crate::output::OutputSpec;
use crate::prompt::call_settings::{
    CallSettings, RetentionConfig, TimeoutConfig, prepare_call_settings,
};
use crate::prompt::{Prompt, validate_and_standardize};
use crate::tool::execute::{execute_tool_call, tool_not_found_result};
use crate::tool::{ToolExecuteOptions, ToolSet};
use genloop_provider::{
    CallOptions, FinishReason, GenerateResponse, LanguageModel, Message, ProviderOptions,
    ResponseFormat, ResponseMetadata, ToolChoice, ToolResult, Usage,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for multi-step text generation.
///
/// # Examples
///
/// ```no_run
/// use genloop_core::{GenerateText, Prompt, step_count_is};
/// use std::sync::Arc;
/// # use genloop_provider::LanguageModel;
/// # use genloop_core::tool::ToolSet;
/// # async fn example(model: Arc<dyn LanguageModel>, tools: ToolSet) -> Result<(), Box<dyn std::error::Error>> {
/// let result = GenerateText::new(model, Prompt::text("What is 2+2?"))
///     .temperature(0.2)
///     .tools(tools)
///     .stop_when(vec![Box::new(step_count_is(5))])
///     .execute()
///     .await?;
///
/// println!("{}", result.text);
/// # Ok(())
/// # }
/// ```
pub struct GenerateText {
    model: Arc<dyn LanguageModel>,
    prompt: Prompt,
    settings: CallSettings,
    tools: Option<ToolSet>,
    tool_choice: Option<ToolChoice>,
    output: Option<OutputSpec>,
    response_format: Option<ResponseFormat>,
    max_steps: Option<usize>,
    stop_when: Option<Vec<Box<dyn StopCondition>>>,
    timeouts: TimeoutConfig,
    retention: RetentionConfig,
    provider_options: Option<ProviderOptions>,
    experimental_context: Option<Value>,
    listeners: EventListeners,
}

impl GenerateText {
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
            max_steps: None,
            stop_when: None,
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

    /// Sets the maximum number of provider-call retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.settings = self.settings.with_max_retries(max_retries);
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

    /// Sets the tool registry for this call.
    pub fn tools(mut self, tools: ToolSet) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Sets the tool choice strategy; `Required` is forwarded verbatim.
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Sets the output specification.
    pub fn output(mut self, output: OutputSpec) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets a raw response format (legacy alternative to `output`).
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Caps the run at `max_steps` steps; sugar for a
    /// [`StepCountIs`] stop condition. An explicit `stop_when` list takes
    /// precedence.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Sets the stop conditions for the multi-step loop.
    pub fn stop_when(mut self, conditions: Vec<Box<dyn StopCondition>>) -> Self {
        self.stop_when = Some(conditions);
        self
    }

    /// Sets the deadline configuration.
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

    /// Sets an opaque value threaded to listeners and tool executions.
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

    /// Registers an `on_tool_call_start` listener.
    pub fn on_tool_call_start<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(ToolCallStartEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_tool_call_start.push(listener(callback));
        self
    }

    /// Registers an `on_tool_call_finish` listener.
    pub fn on_tool_call_finish<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(ToolCallFinishEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_tool_call_finish.push(listener(callback));
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

    /// Runs the configured generation to completion.
    pub async fn execute(self) -> Result<GenerateTextResult, EngineError> {
        match self.timeouts.total {
            Some(limit) => match tokio::time::timeout(limit, self.run()).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::timeout(TimeoutScope::Total)),
            },
            None => self.run().await,
        }
    }

    async fn run(self) -> Result<GenerateTextResult, EngineError> {
        let GenerateText {
            model,
            prompt,
            settings,
            tools,
            tool_choice,
            output,
            response_format,
            max_steps,
            stop_when,
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
        let retry = prepare_retries(settings.max_retries, settings.abort_signal.clone());
        let standardized = validate_and_standardize(prompt)?;

        // Explicit stop conditions win over the max_steps sugar; with
        // neither, a run is a single step.
        let stop_conditions: Vec<Box<dyn StopCondition>> = match stop_when {
            Some(conditions) => conditions,
            None => vec![Box::new(step_count_is(max_steps.unwrap_or(1)))],
        };

        let resolved_format = match &output {
            Some(spec) => Some(spec.response_format()),
            None => response_format,
        };
        let tool_definitions = tools.as_ref().map(|tool_set| tool_set.definitions());
        let abort_signal = settings.abort_signal.clone();

        let initial_messages = standardized.messages.clone();
        let mut history: Vec<Message> = Vec::new();
        let mut steps: Vec<StepResult> = Vec::new();
        let mut total_usage = Usage::default();
        let mut resolutions: HashMap<String, ToolResult> = HashMap::new();
        let mut stop_reason = String::new();
        let mut last_raw_request: Option<Value> = None;
        let mut last_raw_response: Option<Value> = None;
        let mut last_response_metadata: Option<ResponseMetadata> = None;

        notify(
            &listeners.on_start,
            &StartEvent {
                system: standardized.system.clone(),
                messages: initial_messages.clone(),
                experimental_context: experimental_context.clone(),
            },
        )
        .await;

        loop {
            let step_number = steps.len() + 1;

            if let Some(token) = &abort_signal
                && token.is_cancelled()
            {
                return Err(EngineError::Cancelled);
            }

            let mut conversation = initial_messages.clone();
            conversation.extend(history.iter().cloned());

            notify(
                &listeners.on_step_start,
                &StepStartEvent {
                    step_number,
                    messages: conversation.clone(),
                },
            )
            .await;

            let mut call_options = CallOptions::new(conversation.clone());
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
            if let Some(definitions) = &tool_definitions {
                call_options = call_options.with_tools(definitions.clone());
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
            if let Some(signal) = &abort_signal {
                call_options = call_options.with_abort_signal(signal.clone());
            }

            let step_future = run_step(
                &model,
                call_options,
                &retry,
                tools.as_ref(),
                &listeners,
                step_number,
                &conversation,
                &total_usage,
                &experimental_context,
                &abort_signal,
            );
            let outcome = match timeouts.per_step {
                Some(limit) => match tokio::time::timeout(limit, step_future).await {
                    Ok(result) => result?,
                    Err(_) => return Err(EngineError::timeout(TimeoutScope::PerStep)),
                },
                None => step_future.await?,
            };

            for resolution in &outcome.response.tool_results {
                resolutions.insert(
                    resolution.tool_call_id.clone(),
                    resolution.clone().with_provider_executed(true),
                );
            }

            total_usage = total_usage.add(&outcome.response.usage);
            last_raw_request = outcome
                .response
                .request
                .as_ref()
                .and_then(|r| r.body.clone());
            last_raw_response = outcome
                .response
                .response
                .as_ref()
                .and_then(|r| r.body.clone());
            last_response_metadata = outcome.response.response.clone();

            let step = StepResult::new(
                step_number,
                outcome.response.text.clone(),
                outcome.response.tool_calls.clone(),
                outcome.tool_results,
                outcome.response.finish_reason,
                outcome.response.usage.clone(),
                outcome.response.warnings.clone(),
            );
            steps.push(step.clone());

            history.extend(step_response_messages(
                &step.text,
                &step.tool_calls,
                &step.tool_results,
            ));

            notify(&listeners.on_step_finish, &StepFinishEvent { step: step.clone() }).await;

            if step.finish_reason != FinishReason::ToolCalls {
                break;
            }

            let mut conversation_after = initial_messages.clone();
            conversation_after.extend(history.iter().cloned());
            let state = StopState {
                steps: &steps,
                messages: &conversation_after,
                usage: &total_usage,
            };
            if let Some(reason) = first_stop_reason(&stop_conditions, &state).await {
                stop_reason = reason;
                break;
            }
        }

        let mut output_value = None;
        if let Some(spec) = &output {
            let final_text = steps.last().map(|s| s.text.clone()).unwrap_or_default();
            match spec.parse_complete(&final_text) {
                Ok(value) => output_value = Some(value),
                Err(parse_error) => {
                    let finish_reason = steps
                        .last()
                        .map(|s| s.finish_reason)
                        .unwrap_or(FinishReason::Unknown);
                    return Err(EngineError::no_object_generated(
                        parse_error.to_string(),
                        final_text,
                        total_usage,
                        finish_reason,
                        last_response_metadata,
                    ));
                }
            }
        }

        // Pending provider-executed results resolved by later responses are
        // reflected in the aggregate; the originating steps stay immutable.
        let mut aggregated_results: Vec<ToolResult> = steps
            .iter()
            .flat_map(|s| s.tool_results.iter().cloned())
            .collect();
        for result in &mut aggregated_results {
            if result.provider_executed
                && result.is_pending()
                && let Some(resolution) = resolutions.get(&result.tool_call_id)
            {
                *result = resolution.clone();
            }
        }

        let mut result = GenerateTextResult::from_steps(
            steps,
            total_usage,
            aggregated_results,
            stop_reason,
        );
        result.output = output_value;
        if retention.raw_request {
            result.raw_request = last_raw_request;
        }
        if retention.raw_response {
            result.raw_response = last_raw_response;
        }

        notify(
            &listeners.on_finish,
            &FinishEvent {
                text: result.text.clone(),
                finish_reason: result.finish_reason,
                total_usage: result.total_usage.clone(),
                steps: result.steps.clone(),
                stop_reason: result.stop_reason.clone(),
            },
        )
        .await;

        Ok(result)
    }
}

struct StepOutcome {
    response: GenerateResponse,
    tool_results: Vec<ToolResult>,
}

/// One step: provider call (with retries) plus tool dispatch.
#[allow(clippy::too_many_arguments)]
async fn run_step(
    model: &Arc<dyn LanguageModel>,
    call_options: CallOptions,
    retry: &RetryConfig,
    tools: Option<&ToolSet>,
    listeners: &EventListeners,
    step_number: usize,
    step_messages: &[Message],
    usage_before: &Usage,
    experimental_context: &Option<Value>,
    abort_signal: &Option<CancellationToken>,
) -> Result<StepOutcome, EngineError> {
    let provider_name = model.provider().to_string();

    let response = retry
        .execute(|| {
            let options = call_options.clone();
            let model = Arc::clone(model);
            let provider = provider_name.clone();
            async move {
                model
                    .generate(options)
                    .await
                    .map_err(|e| EngineError::provider(provider, step_number, e.to_string()))
            }
        })
        .await?;

    let mut tool_results = Vec::new();
    if let Some(tool_set) = tools
        && !response.tool_calls.is_empty()
    {
        let usage_view = usage_before.add(&response.usage);
        for call in &response.tool_calls {
            let result = match tool_set.get(&call.tool_name) {
                None => tool_not_found_result(call, &tool_set.names()),

                Some(tool) if !tool.is_local() => {
                    // Provider-executed: never invoke the handler. The
                    // result may already be present in this response, or
                    // stay pending until a later one resolves it.
                    match response
                        .tool_results
                        .iter()
                        .find(|r| r.tool_call_id == call.tool_call_id)
                    {
                        Some(resolution) => resolution.clone().with_provider_executed(true),
                        None => ToolResult::pending(&call.tool_call_id, &call.tool_name),
                    }
                }

                Some(tool) => {
                    notify(
                        &listeners.on_tool_call_start,
                        &ToolCallStartEvent {
                            step_number,
                            tool_call: call.clone(),
                        },
                    )
                    .await;

                    let options = ToolExecuteOptions {
                        tool_call_id: call.tool_call_id.clone(),
                        messages: step_messages.to_vec(),
                        usage: usage_view.clone(),
                        experimental_context: experimental_context.clone(),
                        abort_signal: abort_signal.clone(),
                    };
                    let execution = execute_tool_call(tool, call, options);
                    let result = match abort_signal {
                        Some(token) => tokio::select! {
                            _ = token.cancelled() => return Err(EngineError::Cancelled),
                            result = execution => result,
                        },
                        None => execution.await,
                    };

                    notify(
                        &listeners.on_tool_call_finish,
                        &ToolCallFinishEvent {
                            step_number,
                            tool_call_id: result.tool_call_id.clone(),
                            tool_name: result.tool_name.clone(),
                            output: result.output.clone(),
                            error: result.error.clone(),
                            duration_ms: result.duration_ms,
                        },
                    )
                    .await;
                    result
                }
            };
            tool_results.push(result);
        }
    }

    Ok(StepOutcome {
        response,
        tool_results,
    })
}
