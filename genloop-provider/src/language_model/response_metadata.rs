use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata about a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Response id, if the provider assigned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that actually served the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// Unix timestamp of the response, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    /// The raw response body, for providers that expose it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}
