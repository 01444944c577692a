use crate::language_model::BoxError;
use crate::shared::{Headers, ProviderOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Document reranking model trait.
///
/// Reorders documents by relevance to a query; used to improve retrieval
/// quality before generation.
#[async_trait]
pub trait RerankingModel: Send + Sync {
    /// The specification version this model implements.
    fn specification_version(&self) -> &str {
        "v1"
    }

    /// Name of the provider.
    fn provider(&self) -> &str;

    /// Provider-specific model id.
    fn model_id(&self) -> &str;

    /// Reranks the documents by relevance to the query, most relevant first.
    async fn rerank(&self, options: RerankingCallOptions) -> Result<RerankingResponse, BoxError>;
}

/// Options for a reranking call.
#[derive(Debug, Clone, Default)]
pub struct RerankingCallOptions {
    /// The query to rank against.
    pub query: String,

    /// The documents to rank.
    pub documents: Vec<String>,

    /// Return only the top N documents, if set.
    pub top_n: Option<usize>,

    /// Additional HTTP headers.
    pub headers: Option<Headers>,

    /// Namespaced provider-specific options.
    pub provider_options: Option<ProviderOptions>,

    /// Cancellation signal.
    pub abort_signal: Option<CancellationToken>,
}

impl RerankingCallOptions {
    /// Creates options for the given query and documents.
    pub fn new(query: impl Into<String>, documents: Vec<String>) -> Self {
        Self {
            query: query.into(),
            documents,
            ..Default::default()
        }
    }
}

/// A document position with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankedDocument {
    /// Index of the document in the input list.
    pub index: usize,

    /// Relevance score assigned by the model; higher is more relevant.
    pub relevance_score: f64,
}

/// The result of a reranking call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankingResponse {
    /// Documents ordered by descending relevance.
    pub ranking: Vec<RerankedDocument>,

    /// Tokens consumed by the call, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,

    /// The raw response body, if the provider exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}
