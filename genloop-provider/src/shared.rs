use serde_json::Value;
use std::collections::HashMap;

/// Additional provider-specific options, namespaced by provider.
///
/// The outer key is the provider namespace (e.g. `"openai"`), the inner map
/// carries provider-defined settings. The engine passes these through
/// without interpretation.
pub type ProviderOptions = HashMap<String, HashMap<String, Value>>;

/// Additional HTTP headers, passed through to HTTP-based providers.
pub type Headers = HashMap<String, String>;
