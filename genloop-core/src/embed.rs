//! Embedding generation, a thin facade over the [`EmbeddingModel`] port.

use crate::error::EngineError;
use genloop_provider::{
    EmbeddingCallOptions, EmbeddingModel, Headers, ProviderOptions,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for embedding a single value.
///
/// # Examples
///
/// ```no_run
/// use genloop_core::Embed;
/// use std::sync::Arc;
/// # use genloop_provider::EmbeddingModel;
/// # async fn example(model: Arc<dyn EmbeddingModel>) -> Result<(), Box<dyn std::error::Error>> {
/// let result = Embed::new(model, "sunny day at the beach").execute().await?;
/// println!("dimension: {}", result.embedding.len());
/// # Ok(())
/// # }
/// ```
pub struct Embed {
    model: Arc<dyn EmbeddingModel>,
    value: String,
    headers: Option<Headers>,
    provider_options: Option<ProviderOptions>,
    abort_signal: Option<CancellationToken>,
}

impl Embed {
    /// Creates a builder for the given model and value.
    pub fn new(model: Arc<dyn EmbeddingModel>, value: impl Into<String>) -> Self {
        Self {
            model,
            value: value.into(),
            headers: None,
            provider_options: None,
            abort_signal: None,
        }
    }

    /// Sets additional HTTP headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets namespaced provider options.
    pub fn provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider_options = Some(options);
        self
    }

    /// Sets the cancellation signal.
    pub fn abort_signal(mut self, signal: CancellationToken) -> Self {
        self.abort_signal = Some(signal);
        self
    }

    /// Runs the embedding call.
    pub async fn execute(self) -> Result<EmbedResult, EngineError> {
        if self.value.is_empty() {
            return Err(EngineError::invalid_argument(
                "value",
                "",
                "value must not be empty",
            ));
        }

        let provider = self.model.provider().to_string();
        let options = EmbeddingCallOptions {
            values: vec![self.value.clone()],
            headers: self.headers,
            provider_options: self.provider_options,
            abort_signal: self.abort_signal,
        };
        let mut response = self
            .model
            .embed(options)
            .await
            .map_err(|e| EngineError::provider(provider.clone(), 1, e.to_string()))?;

        if response.embeddings.is_empty() {
            return Err(EngineError::provider(
                provider,
                1,
                "embedding response contained no embeddings",
            ));
        }

        Ok(EmbedResult {
            value: self.value,
            embedding: response.embeddings.swap_remove(0),
            tokens: response.tokens,
            response: response.response,
        })
    }
}

/// The result of embedding a single value.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedResult {
    /// The value that was embedded.
    pub value: String,

    /// The embedding vector.
    pub embedding: Vec<f32>,

    /// Tokens consumed by the call, if reported.
    pub tokens: Option<u64>,

    /// The raw response body, if the provider exposes it.
    pub response: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genloop_provider::language_model::BoxError;
    use genloop_provider::EmbeddingResponse;

    struct FixedEmbeddingModel;

    #[async_trait]
    impl EmbeddingModel for FixedEmbeddingModel {
        fn provider(&self) -> &str {
            "test-provider"
        }
        fn model_id(&self) -> &str {
            "test-embedding-model"
        }
        async fn embed(
            &self,
            options: EmbeddingCallOptions,
        ) -> Result<EmbeddingResponse, BoxError> {
            Ok(EmbeddingResponse {
                embeddings: options.values.iter().map(|_| vec![0.1, 0.2, 0.3]).collect(),
                tokens: Some(4),
                response: None,
            })
        }
    }

    #[tokio::test]
    async fn test_embed_single_value() {
        let result = Embed::new(Arc::new(FixedEmbeddingModel), "hello")
            .execute()
            .await
            .unwrap();
        assert_eq!(result.value, "hello");
        assert_eq!(result.embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(result.tokens, Some(4));
    }

    #[tokio::test]
    async fn test_empty_value_rejected() {
        let error = Embed::new(Arc::new(FixedEmbeddingModel), "")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::InvalidArgument { .. }));
    }
}
