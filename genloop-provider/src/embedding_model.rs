use crate::language_model::BoxError;
use crate::shared::{Headers, ProviderOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Embedding model trait for converting values into vector embeddings.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// The specification version this model implements.
    fn specification_version(&self) -> &str {
        "v1"
    }

    /// Name of the provider.
    fn provider(&self) -> &str;

    /// Provider-specific model id.
    fn model_id(&self) -> &str;

    /// Embeds the given values, preserving input order.
    async fn embed(&self, options: EmbeddingCallOptions) -> Result<EmbeddingResponse, BoxError>;
}

/// Options for an embedding call.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCallOptions {
    /// The values to embed.
    pub values: Vec<String>,

    /// Additional HTTP headers.
    pub headers: Option<Headers>,

    /// Namespaced provider-specific options.
    pub provider_options: Option<ProviderOptions>,

    /// Cancellation signal.
    pub abort_signal: Option<CancellationToken>,
}

impl EmbeddingCallOptions {
    /// Creates options for the given values.
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }
}

/// The result of an embedding call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One embedding per input value, in input order.
    pub embeddings: Vec<Vec<f32>>,

    /// Tokens consumed by the call, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,

    /// The raw response body, if the provider exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}
