use crate::language_model::call_options::CallOptions;
use crate::language_model::call_warning::CallWarning;
use crate::language_model::finish_reason::FinishReason;
use crate::language_model::response_metadata::ResponseMetadata;
use crate::language_model::stream_chunk::StreamChunk;
use crate::language_model::tool_call::ToolCall;
use crate::language_model::tool_result::ToolResult;
use crate::language_model::usage::Usage;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Call options for language model requests.
pub mod call_options;
/// Warning types for language model responses.
pub mod call_warning;
/// Finish reason types for language model responses.
pub mod finish_reason;
/// Response metadata types.
pub mod response_metadata;
/// Stream chunk types for streaming responses.
pub mod stream_chunk;
/// Wire-level tool definitions.
pub mod tool;
/// Tool call types.
pub mod tool_call;
/// Tool choice strategy types.
pub mod tool_choice;
/// Tool result types.
pub mod tool_result;
/// Token usage tracking types.
pub mod usage;

/// Boxed error type used at the port boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single-consumer stream of chunks.
///
/// The stream is owned by the engine's aggregator worker; dropping it
/// cancels any underlying I/O. A well-behaved stream terminates with
/// exactly one [`StreamChunk::Finish`]; `Err` items surface transport
/// faults after streaming began.
pub type ChunkStream = Box<dyn Stream<Item = Result<StreamChunk, BoxError>> + Send + Unpin>;

/// Language model trait for text generation and streaming.
///
/// This is the uniform call surface every provider backend exposes. The
/// engine is provider-agnostic: it builds [`CallOptions`], invokes one of
/// the two operations, and interprets the results without knowing anything
/// about the vendor wire format.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The specification version this model implements.
    fn specification_version(&self) -> &str {
        "v1"
    }

    /// Name of the provider, e.g. "openai", "anthropic".
    fn provider(&self) -> &str;

    /// Provider-specific model id, e.g. "gpt-4o", "claude-sonnet-4".
    fn model_id(&self) -> &str;

    /// Whether the model supports tool calling.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Whether the model supports structured (JSON) output.
    fn supports_structured_output(&self) -> bool {
        true
    }

    /// Whether the model accepts image content parts.
    fn supports_image_input(&self) -> bool {
        false
    }

    /// Generates a complete response.
    ///
    /// Blocks (asynchronously) until the full response is available.
    async fn generate(&self, options: CallOptions) -> Result<GenerateResponse, BoxError>;

    /// Starts a streaming generation.
    ///
    /// Returns a handle whose chunk stream must terminate with exactly one
    /// `Finish` chunk unless the stream is aborted.
    async fn stream(&self, options: CallOptions) -> Result<StreamResponse, BoxError>;
}

/// The result of a buffered generation call.
#[derive(Debug, Default)]
pub struct GenerateResponse {
    /// The generated text.
    pub text: String,

    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCall>,

    /// Results of tools the provider executed itself.
    ///
    /// Used by the engine to resolve pending provider-executed calls,
    /// including calls issued in earlier steps.
    pub tool_results: Vec<ToolResult>,

    /// Why generation finished.
    pub finish_reason: FinishReason,

    /// Token usage for this call.
    pub usage: Usage,

    /// Non-fatal warnings.
    pub warnings: Vec<CallWarning>,

    /// Opaque provider information about automatic history cleanup.
    pub context_management: Option<Value>,

    /// Metadata about the request that was sent.
    pub request: Option<RequestMetadata>,

    /// Metadata about the response.
    pub response: Option<ResponseMetadata>,
}

/// The result of starting a streaming generation call.
pub struct StreamResponse {
    /// The chunk stream; single-consumer.
    pub stream: ChunkStream,

    /// Metadata about the request that was sent.
    pub request: Option<RequestMetadata>,

    /// Metadata about the response, as far as known at stream start.
    pub response: Option<ResponseMetadata>,
}

/// Metadata about the request sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestMetadata {
    /// The raw request body, if the provider exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}
