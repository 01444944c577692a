use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token usage for a language model call.
///
/// Every numeric field is optional: providers report what they know and
/// nothing else. `Usage` forms a commutative monoid under [`Usage::add`] -
/// the all-absent value is the neutral element, and the engine accumulates
/// per-step usage by repeated addition. The engine trusts provider values
/// and never re-derives `total_tokens` from the parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// The number of input (prompt) tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    /// The number of output (completion) tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,

    /// The total number of tokens as reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,

    /// Breakdown of the input tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_details: Option<InputTokenDetails>,

    /// Breakdown of the output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_details: Option<OutputTokenDetails>,

    /// Raw usage payload from the provider, union-merged on addition.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub raw: Map<String, Value>,
}

/// Detail buckets for input tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InputTokenDetails {
    /// Input tokens that were not served from a cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<u64>,

    /// Input tokens read from a prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<u64>,

    /// Input tokens written to a prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<u64>,

    /// Text input tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<u64>,

    /// Image input tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<u64>,
}

/// Detail buckets for output tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputTokenDetails {
    /// Text output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<u64>,

    /// Reasoning output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<u64>,
}

/// Option-aware addition: absent counts as 0, but a field stays absent
/// only when it is absent on both sides.
fn opt_add(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        _ => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

impl InputTokenDetails {
    fn add(&self, other: &Self) -> Self {
        Self {
            no_cache: opt_add(self.no_cache, other.no_cache),
            cache_read: opt_add(self.cache_read, other.cache_read),
            cache_write: opt_add(self.cache_write, other.cache_write),
            text: opt_add(self.text, other.text),
            image: opt_add(self.image, other.image),
        }
    }
}

impl OutputTokenDetails {
    fn add(&self, other: &Self) -> Self {
        Self {
            text: opt_add(self.text, other.text),
            reasoning: opt_add(self.reasoning, other.reasoning),
        }
    }
}

impl Usage {
    /// Creates a usage record with input/output counts and a derived total.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            total_tokens: Some(input_tokens + output_tokens),
            ..Default::default()
        }
    }

    /// Field-wise option-aware addition.
    ///
    /// Detail buckets add recursively; `raw` is union-merged with the right
    /// operand winning on key collisions.
    pub fn add(&self, other: &Usage) -> Usage {
        let input_details = match (&self.input_details, &other.input_details) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(a.add(b)),
        };
        let output_details = match (&self.output_details, &other.output_details) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(a.add(b)),
        };
        let mut raw = self.raw.clone();
        for (key, value) in &other.raw {
            raw.insert(key.clone(), value.clone());
        }

        Usage {
            input_tokens: opt_add(self.input_tokens, other.input_tokens),
            output_tokens: opt_add(self.output_tokens, other.output_tokens),
            total_tokens: opt_add(self.total_tokens, other.total_tokens),
            input_details,
            output_details,
            raw,
        }
    }

    /// The total token count, falling back to input + output when the
    /// provider did not report a total.
    pub fn total(&self) -> u64 {
        self.total_tokens.unwrap_or_else(|| {
            self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
        })
    }
}
