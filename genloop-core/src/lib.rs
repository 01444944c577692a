//! genloop core - a provider-agnostic generation engine.
//!
//! Applications hand the engine a prompt, a language-model handle, an
//! optional tool set, an optional output specification, and optional stop
//! conditions. The engine runs a bounded multi-step loop of provider calls
//! interleaved with local tool execution, streams partial results when
//! requested, parses structured output, accumulates token usage, and fans
//! lifecycle events out to listeners.
//!
//! Provider backends implement the port defined in `genloop-provider`;
//! this crate is the only component that understands multi-step tool
//! dispatch, stop conditions, structured output binding, and streaming
//! aggregation.
//!
//! # Entry points
//!
//! - [`GenerateText`]: buffered multi-step generation with tool calling
//! - [`StreamText`]: streaming generation with incremental partial output
//! - [`GenerateObject`] / [`StreamObject`]: typed structured output
//! - [`Embed`] / [`Rerank`]: thin facades over the auxiliary ports
//!
//! # Text generation with tools
//!
//! ```no_run
//! use genloop_core::{GenerateText, Prompt, Tool, ToolSet, step_count_is};
//! use serde_json::json;
//! use std::sync::Arc;
//! # use genloop_provider::LanguageModel;
//! # async fn example(model: Arc<dyn LanguageModel>) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let tools = ToolSet::new().with_tool(
//!     Tool::new(
//!         "get_weather",
//!         json!({
//!             "type": "object",
//!             "properties": {"city": {"type": "string"}},
//!             "required": ["city"],
//!         }),
//!     )
//!     .with_description("Get the current weather for a city")
//!     .with_execute(|input, _options| async move {
//!         Ok(json!({"city": input["city"], "weather": "sunny"}))
//!     }),
//! );
//!
//! let result = GenerateText::new(model, Prompt::text("Weather in Paris?"))
//!     .tools(tools)
//!     .stop_when(vec![Box::new(step_count_is(5))])
//!     .execute()
//!     .await?;
//!
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```
//!
//! # Streaming
//!
//! ```no_run
//! use genloop_core::{Prompt, StreamText};
//! use futures_util::StreamExt;
//! use genloop_provider::StreamChunk;
//! use std::sync::Arc;
//! # use genloop_provider::LanguageModel;
//! # async fn example(model: Arc<dyn LanguageModel>) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let result = StreamText::new(model, Prompt::text("Write a haiku"))
//!     .execute()
//!     .await?;
//!
//! let mut chunks = result.chunks();
//! while let Some(chunk) = chunks.next().await {
//!     if let StreamChunk::TextDelta { delta } = chunk {
//!         print!("{delta}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Embedding generation.
pub mod embed;
/// Error types for the engine.
pub mod error;
/// Lifecycle events and the panic-isolated dispatcher.
pub mod events;
/// Typed object generation.
pub mod generate_object;
/// Multi-step text generation.
pub mod generate_text;
/// Output specifications and their parsers.
pub mod output;
/// Best-effort parsing of truncated JSON.
pub mod partial_json;
/// Prompt types and call settings.
pub mod prompt;
/// Document reranking.
pub mod rerank;
/// Typed object streaming.
pub mod stream_object;
/// Streaming text generation.
pub mod stream_text;
/// The tool system.
pub mod tool;

pub use embed::{Embed, EmbedResult};
pub use error::{EngineError, TimeoutScope};
pub use events::{
    EventListener, EventListeners, FinishEvent, StartEvent, StepFinishEvent, StepStartEvent,
    ToolCallFinishEvent, ToolCallStartEvent, listener,
};
pub use generate_object::{GenerateObject, GenerateObjectResult};
pub use generate_text::{
    GenerateText, GenerateTextResult, HasToolCall, StepCountIs, StepResult, StopCondition,
    StopState, first_stop_reason, has_tool_call, step_count_is,
};
pub use output::{OutputParseError, OutputParseErrorKind, OutputSpec};
pub use partial_json::parse_partial_json;
pub use prompt::call_settings::{
    CallSettings, PreparedCallSettings, RetentionConfig, TimeoutConfig, prepare_call_settings,
};
pub use prompt::{Prompt, PromptContent, StandardizedPrompt, validate_and_standardize};
pub use rerank::{RankedDocument, Rerank, RerankResult};
pub use stream_object::{ObjectStream, StreamObject};
pub use stream_text::{AsyncIterableStream, StreamStatus, StreamText, StreamTextResult};
pub use tool::{Tool, ToolExecuteFn, ToolExecuteOptions, ToolLocality, ToolSet, execute_tool_call};
