//! The tool system: tool definitions as data plus optional local handlers.
//!
//! A [`Tool`] is a record: name, description, argument schema, and a
//! locality tag. Locally-executed tools carry a handler the engine invokes;
//! provider-executed tools are dispatched and resolved entirely by the
//! provider, and the engine only tracks pending/resolved state. Vendor
//! specificity lives in provider crates, never in `Tool` itself.

/// Execution of a single tool call.
pub mod execute;

use genloop_provider::{Message, ToolDefinition, Usage};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use execute::execute_tool_call;

/// Where a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolLocality {
    /// The handler runs inside the engine's process.
    Local,
    /// The provider dispatches and resolves the call itself.
    ProviderExecuted,
}

/// Context passed to a tool handler alongside the call arguments.
#[derive(Debug, Clone, Default)]
pub struct ToolExecuteOptions {
    /// The id of the tool call being executed; disambiguates multiple
    /// calls to the same tool within a step.
    pub tool_call_id: String,

    /// The conversation messages at the time of the call.
    pub messages: Vec<Message>,

    /// A snapshot of the usage accumulated so far, including the step
    /// that produced this call.
    pub usage: Usage,

    /// Opaque caller context threaded through from the entry options.
    pub experimental_context: Option<Value>,

    /// Cancellation signal for the operation.
    pub abort_signal: Option<CancellationToken>,
}

/// The handler of a locally-executed tool.
///
/// Receives the parsed call arguments and the execution context; resolves
/// to the result value or an error value. Error values are recovered into
/// `ToolResult.error` and the generation loop continues.
pub type ToolExecuteFn = Arc<
    dyn Fn(Value, ToolExecuteOptions) -> Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>
        + Send
        + Sync,
>;

/// A tool the model can call.
#[derive(Clone)]
pub struct Tool {
    /// The name the model uses to call the tool.
    pub name: String,

    /// What the tool does.
    pub description: Option<String>,

    /// JSON Schema of the tool arguments.
    pub parameter_schema: Value,

    /// Where the tool runs.
    pub locality: ToolLocality,

    /// Whether the provider should enforce the schema strictly.
    pub strict: bool,

    /// Handler for locally-executed tools. Required when `locality` is
    /// [`ToolLocality::Local`]; never invoked when the tool is
    /// provider-executed.
    pub execute: Option<ToolExecuteFn>,
}

impl Tool {
    /// Creates a locally-executed tool.
    pub fn new(name: impl Into<String>, parameter_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameter_schema,
            locality: ToolLocality::Local,
            strict: false,
            execute: None,
        }
    }

    /// Creates a provider-executed tool.
    pub fn provider_executed(name: impl Into<String>, parameter_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameter_schema,
            locality: ToolLocality::ProviderExecuted,
            strict: false,
            execute: None,
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

    /// Sets the handler.
    pub fn with_execute<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, ToolExecuteOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.execute = Some(Arc::new(move |input, options| {
            Box::pin(handler(input, options))
        }));
        self
    }

    /// True if the tool runs inside the engine's process.
    pub fn is_local(&self) -> bool {
        self.locality == ToolLocality::Local
    }

    /// The wire-level definition sent to providers.
    pub fn definition(&self) -> ToolDefinition {
        let mut definition = ToolDefinition::new(&self.name, self.parameter_schema.clone())
            .with_strict(self.strict)
            .with_provider_executed(self.locality == ToolLocality::ProviderExecuted);
        if let Some(description) = &self.description {
            definition = definition.with_description(description.clone());
        }
        definition
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("locality", &self.locality)
            .field("strict", &self.strict)
            .field("has_execute", &self.execute.is_some())
            .finish()
    }
}

/// A name-keyed tool registry, read-only once an operation starts.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Tool>,
}

impl ToolSet {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any tool with the same name.
    pub fn insert(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Adds a tool, builder style.
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.insert(tool);
        self
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// True if a tool with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// The number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Iterates over the registered tools in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    /// The wire-level definitions of all registered tools, in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(Tool::definition).collect()
    }
}

impl From<Vec<Tool>> for ToolSet {
    fn from(tools: Vec<Tool>) -> Self {
        let mut set = Self::new();
        for tool in tools {
            set.insert(tool);
        }
        set
    }
}
