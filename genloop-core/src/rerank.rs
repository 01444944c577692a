//! Document reranking, a thin facade over the [`RerankingModel`] port.

use crate::error::EngineError;
use genloop_provider::{
    Headers, ProviderOptions, RerankingCallOptions, RerankingModel,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for reranking documents by relevance to a query.
///
/// # Examples
///
/// ```no_run
/// use genloop_core::Rerank;
/// use std::sync::Arc;
/// # use genloop_provider::RerankingModel;
/// # async fn example(model: Arc<dyn RerankingModel>) -> Result<(), Box<dyn std::error::Error>> {
/// let documents = vec![
///     "The weather is sunny".to_string(),
///     "Rust is a systems language".to_string(),
/// ];
/// let result = Rerank::new(model, "programming languages", documents)
///     .top_n(1)
///     .execute()
///     .await?;
/// println!("best match: {}", result.ranking[0].document);
/// # Ok(())
/// # }
/// ```
pub struct Rerank {
    model: Arc<dyn RerankingModel>,
    query: String,
    documents: Vec<String>,
    top_n: Option<usize>,
    headers: Option<Headers>,
    provider_options: Option<ProviderOptions>,
    abort_signal: Option<CancellationToken>,
}

impl Rerank {
    /// Creates a builder for the given model, query, and documents.
    pub fn new(
        model: Arc<dyn RerankingModel>,
        query: impl Into<String>,
        documents: Vec<String>,
    ) -> Self {
        Self {
            model,
            query: query.into(),
            documents,
            top_n: None,
            headers: None,
            provider_options: None,
            abort_signal: None,
        }
    }

    /// Returns only the top N documents.
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
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

    /// Runs the reranking call.
    pub async fn execute(self) -> Result<RerankResult, EngineError> {
        if self.documents.is_empty() {
            return Err(EngineError::invalid_argument(
                "documents",
                "[]",
                "documents must not be empty",
            ));
        }

        let provider = self.model.provider().to_string();
        let options = RerankingCallOptions {
            query: self.query,
            documents: self.documents.clone(),
            top_n: self.top_n,
            headers: self.headers,
            provider_options: self.provider_options,
            abort_signal: self.abort_signal,
        };
        let response = self
            .model
            .rerank(options)
            .await
            .map_err(|e| EngineError::provider(provider.clone(), 1, e.to_string()))?;

        let mut ranking = Vec::with_capacity(response.ranking.len());
        for ranked in response.ranking {
            let document = self.documents.get(ranked.index).cloned().ok_or_else(|| {
                EngineError::provider(
                    provider.clone(),
                    1,
                    format!("ranking referenced unknown document index {}", ranked.index),
                )
            })?;
            ranking.push(RankedDocument {
                index: ranked.index,
                relevance_score: ranked.relevance_score,
                document,
            });
        }

        Ok(RerankResult {
            ranking,
            tokens: response.tokens,
            response: response.response,
        })
    }
}

/// A document with its rank information.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    /// Index of the document in the input list.
    pub index: usize,

    /// Relevance score assigned by the model; higher is more relevant.
    pub relevance_score: f64,

    /// The document text.
    pub document: String,
}

/// The result of a reranking call, most relevant first.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    /// The ranked documents.
    pub ranking: Vec<RankedDocument>,

    /// Tokens consumed by the call, if reported.
    pub tokens: Option<u64>,

    /// The raw response body, if the provider exposes it.
    pub response: Option<Value>,
}
