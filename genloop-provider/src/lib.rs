//! genloop provider layer - the contract language model backends implement.
//!
//! This crate defines the port consumed by the genloop engine (`genloop-core`).
//! A backend integrates with the engine by implementing [`LanguageModel`]:
//! one buffered operation ([`LanguageModel::generate`]) and one streaming
//! operation ([`LanguageModel::stream`]), both driven by
//! [`CallOptions`](language_model::call_options::CallOptions). The engine is
//! the only consumer of these traits; it never sees vendor wire formats,
//! HTTP transports, or SSE framing - those live entirely inside provider
//! crates.
//!
//! # Core types
//!
//! - [`LanguageModel`]: generate/stream contract plus capability flags
//! - [`Message`] / [`ContentPart`]: the provider-facing conversation model
//! - [`Usage`](language_model::usage::Usage): option-aware token accounting
//! - [`StreamChunk`](language_model::stream_chunk::StreamChunk): the
//!   transport-level streaming vocabulary, terminated by a `Finish` chunk
//! - [`EmbeddingModel`] / [`RerankingModel`]: thin auxiliary ports
//!
//! # Implementing a provider
//!
//! ```no_run
//! use genloop_provider::language_model::{
//!     BoxError, GenerateResponse, LanguageModel, StreamResponse,
//!     call_options::CallOptions,
//! };
//! use async_trait::async_trait;
//!
//! struct MyModel {
//!     model_id: String,
//! }
//!
//! #[async_trait]
//! impl LanguageModel for MyModel {
//!     fn provider(&self) -> &str {
//!         "my-provider"
//!     }
//!
//!     fn model_id(&self) -> &str {
//!         &self.model_id
//!     }
//!
//!     async fn generate(&self, options: CallOptions) -> Result<GenerateResponse, BoxError> {
//!         todo!()
//!     }
//!
//!     async fn stream(&self, options: CallOptions) -> Result<StreamResponse, BoxError> {
//!         todo!()
//!     }
//! }
//! ```

#![warn(missing_docs)]

/// Embedding model port.
pub mod embedding_model;
/// Language model port: trait, call options, usage, stream chunks.
pub mod language_model;
/// Provider-facing message and content-part types.
pub mod message;
/// Reranking model port.
pub mod reranking_model;
/// Shared pass-through types (provider options, headers).
pub mod shared;

pub use embedding_model::{EmbeddingCallOptions, EmbeddingModel, EmbeddingResponse};
pub use language_model::{
    BoxError, ChunkStream, GenerateResponse, LanguageModel, RequestMetadata, StreamResponse,
    call_options::{CallOptions, ResponseFormat},
    call_warning::CallWarning,
    finish_reason::FinishReason,
    response_metadata::ResponseMetadata,
    stream_chunk::StreamChunk,
    tool::ToolDefinition,
    tool_call::ToolCall,
    tool_choice::ToolChoice,
    tool_result::ToolResult,
    usage::{InputTokenDetails, OutputTokenDetails, Usage},
};
pub use message::{ContentPart, ImageSource, Message, Role, ToolResultPart};
pub use reranking_model::{
    RerankedDocument, RerankingCallOptions, RerankingModel, RerankingResponse,
};
pub use shared::{Headers, ProviderOptions};
