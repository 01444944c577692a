use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire-level description of a tool, as sent to providers.
///
/// This is the data half of a tool: the engine keeps handlers to itself and
/// forwards only the definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// The name the model uses to call the tool.
    pub name: String,

    /// What the tool does; used by the model to decide whether to call it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the tool arguments.
    pub input_schema: Value,

    /// Whether the provider should enforce the schema strictly.
    #[serde(default)]
    pub strict: bool,

    /// Whether the provider executes the tool itself.
    #[serde(default)]
    pub provider_executed: bool,
}

impl ToolDefinition {
    /// Creates a tool definition with the given name and argument schema.
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            strict: false,
            provider_executed: false,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets strict schema enforcement.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Marks the tool as provider-executed.
    pub fn with_provider_executed(mut self, provider_executed: bool) -> Self {
        self.provider_executed = provider_executed;
        self
    }
}
