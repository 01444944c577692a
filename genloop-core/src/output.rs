//! Declarative output specifications.
//!
//! An [`OutputSpec`] describes how model text becomes a typed value: it
//! derives the [`ResponseFormat`] sent to providers, parses the final text
//! when an operation completes, and best-effort-parses incomplete text
//! while streaming. The generation loop matches on the variant; each case
//! owns its parsing rules.

use crate::partial_json::parse_partial_json;
use genloop_provider::ResponseFormat;
use schemars::JsonSchema;
use serde_json::{Value, json};

/// How model text should be parsed into a typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSpec {
    /// Pass the text through unchanged.
    Text,

    /// A JSON object validated against a schema.
    Object {
        /// JSON Schema of the object.
        schema: Value,
    },

    /// A JSON array of schema-validated elements, wrapped by providers in
    /// `{"elements": [...]}`.
    Array {
        /// JSON Schema of a single element.
        element_schema: Value,
    },

    /// One of a fixed set of string options, wrapped by providers in
    /// `{"result": "..."}`.
    Choice {
        /// The allowed options.
        options: Vec<String>,
    },

    /// Untyped JSON.
    Json,
}

/// Error produced by a complete parser.
#[derive(Debug, Clone)]
pub struct OutputParseError {
    /// Human-readable description of the failure.
    pub message: String,
    /// The failure category.
    pub kind: OutputParseErrorKind,
}

/// The kind of output parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputParseErrorKind {
    /// The text is not valid JSON.
    InvalidJson,
    /// The JSON is valid but does not match the expected schema.
    SchemaMismatch,
    /// A required field is missing.
    MissingField,
    /// Any other failure.
    Other,
}

impl OutputParseError {
    fn new(message: impl Into<String>, kind: OutputParseErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn invalid_json(message: impl Into<String>) -> Self {
        Self::new(message, OutputParseErrorKind::InvalidJson)
    }

    fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(message, OutputParseErrorKind::SchemaMismatch)
    }

    fn missing_field(field: &str) -> Self {
        Self::new(
            format!("missing required field: {field}"),
            OutputParseErrorKind::MissingField,
        )
    }
}

impl std::fmt::Display for OutputParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for OutputParseError {}

fn validate_against(schema: &Value, instance: &Value) -> Result<(), OutputParseError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        OutputParseError::new(
            format!("invalid output schema: {e}"),
            OutputParseErrorKind::Other,
        )
    })?;
    if !validator.is_valid(instance) {
        let details: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(OutputParseError::schema_mismatch(format!(
            "output does not match schema: {}",
            details.join("; ")
        )));
    }
    Ok(())
}

impl OutputSpec {
    /// Plain text output.
    pub fn text() -> Self {
        Self::Text
    }

    /// Untyped JSON output.
    pub fn json() -> Self {
        Self::Json
    }

    /// Object output validated against the given schema.
    pub fn object(schema: Value) -> Self {
        Self::Object { schema }
    }

    /// Object output with a schema derived from `T`.
    pub fn object_of<T: JsonSchema>() -> Self {
        Self::Object {
            schema: schema_value::<T>(),
        }
    }

    /// Array output whose elements are validated against the given schema.
    pub fn array(element_schema: Value) -> Self {
        Self::Array { element_schema }
    }

    /// Array output with an element schema derived from `T`.
    pub fn array_of<T: JsonSchema>() -> Self {
        Self::Array {
            element_schema: schema_value::<T>(),
        }
    }

    /// Choice output over the given string options.
    pub fn choice<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choice {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Derives the response-format contract sent to providers.
    pub fn response_format(&self) -> ResponseFormat {
        match self {
            OutputSpec::Text => ResponseFormat::Text,
            OutputSpec::Json => ResponseFormat::json(),
            OutputSpec::Object { schema } => ResponseFormat::json_with_schema(schema.clone()),
            OutputSpec::Array { element_schema } => ResponseFormat::json_with_schema(json!({
                "type": "object",
                "required": ["elements"],
                "additionalProperties": false,
                "properties": {
                    "elements": {
                        "type": "array",
                        "items": element_schema,
                    },
                },
            })),
            OutputSpec::Choice { options } => ResponseFormat::json_with_schema(json!({
                "type": "object",
                "required": ["result"],
                "properties": {
                    "result": {
                        "type": "string",
                        "enum": options,
                    },
                },
            })),
        }
    }

    /// Parses and validates the complete final text.
    ///
    /// Array outputs yield the unwrapped element array; Choice outputs
    /// yield the selected option as a string.
    pub fn parse_complete(&self, text: &str) -> Result<Value, OutputParseError> {
        match self {
            OutputSpec::Text => Ok(Value::String(text.to_string())),

            OutputSpec::Json => serde_json::from_str(text)
                .map_err(|e| OutputParseError::invalid_json(format!("invalid JSON output: {e}"))),

            OutputSpec::Object { schema } => {
                let value: Value = serde_json::from_str(text).map_err(|e| {
                    OutputParseError::invalid_json(format!("invalid JSON output: {e}"))
                })?;
                validate_against(schema, &value)?;
                Ok(value)
            }

            OutputSpec::Array { element_schema } => {
                let value: Value = serde_json::from_str(text).map_err(|e| {
                    OutputParseError::invalid_json(format!("invalid JSON output: {e}"))
                })?;
                let elements = value
                    .get("elements")
                    .ok_or_else(|| OutputParseError::missing_field("elements"))?
                    .as_array()
                    .ok_or_else(|| {
                        OutputParseError::schema_mismatch("'elements' is not an array")
                    })?;
                for element in elements {
                    validate_against(element_schema, element)?;
                }
                Ok(Value::Array(elements.clone()))
            }

            OutputSpec::Choice { options } => {
                let selected = serde_json::from_str::<Value>(text)
                    .ok()
                    .and_then(|v| {
                        v.get("result")
                            .and_then(|r| r.as_str())
                            .map(|s| s.to_string())
                    })
                    .or_else(|| {
                        let trimmed = text.trim();
                        options.iter().find(|o| *o == trimmed).cloned()
                    })
                    .ok_or_else(|| OutputParseError::missing_field("result"))?;
                if options.contains(&selected) {
                    Ok(Value::String(selected))
                } else {
                    Err(OutputParseError::schema_mismatch(format!(
                        "'{selected}' is not one of the allowed choices: {options:?}"
                    )))
                }
            }
        }
    }

    /// Best-effort parse of incomplete text.
    ///
    /// Total: never fails, returns `None` when no coherent prefix is
    /// available yet. Object partials are not schema-validated; Array
    /// partials contain only schema-valid elements; ambiguous Choice
    /// prefixes yield `Value::Null`.
    pub fn parse_partial(&self, text: &str) -> Option<Value> {
        match self {
            OutputSpec::Text => {
                if text.is_empty() {
                    None
                } else {
                    Some(Value::String(text.to_string()))
                }
            }

            OutputSpec::Json | OutputSpec::Object { .. } => parse_partial_json(text),

            OutputSpec::Array { .. } => {
                parse_partial_json(text)?;
                Some(Value::Array(self.partial_elements(text)))
            }

            OutputSpec::Choice { options } => {
                let value = parse_partial_json(text)?;
                let partial = value.get("result")?.as_str()?.to_string();
                if options.contains(&partial) {
                    return Some(Value::String(partial));
                }
                let matches: Vec<&String> =
                    options.iter().filter(|o| o.starts_with(&partial)).collect();
                if matches.len() == 1 {
                    Some(Value::String(matches[0].clone()))
                } else {
                    Some(Value::Null)
                }
            }
        }
    }

    /// The fully-formed, schema-valid elements currently recoverable from
    /// a growing Array buffer, in order.
    ///
    /// The trailing element is suppressed while it fails validation and
    /// the wrapper array is still open, so truncated elements are never
    /// reported.
    pub fn partial_elements(&self, text: &str) -> Vec<Value> {
        let OutputSpec::Array { element_schema } = self else {
            return Vec::new();
        };
        let Some(value) = parse_partial_json(text) else {
            return Vec::new();
        };
        let Some(elements) = value.get("elements").and_then(|e| e.as_array()) else {
            return Vec::new();
        };
        let Ok(validator) = jsonschema::validator_for(element_schema) else {
            return Vec::new();
        };
        elements
            .iter()
            .filter(|element| validator.is_valid(element))
            .cloned()
            .collect()
    }
}

fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}
