//! Typed object generation, sugar over [`GenerateText`] with an Object
//! output specification derived from the target type.

use crate::error::EngineError;
use crate::generate_text::GenerateText;
use crate::output::OutputSpec;
use crate::prompt::Prompt;
use crate::prompt::call_settings::{CallSettings, RetentionConfig, TimeoutConfig};
use genloop_provider::{CallWarning, FinishReason, LanguageModel, ProviderOptions, Usage};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for generating a typed object.
///
/// The JSON Schema of `T` is derived via `schemars` and sent to the
/// provider as the response format; the final text is parsed, validated,
/// and deserialized into `T`.
///
/// # Examples
///
/// ```no_run
/// use genloop_core::{GenerateObject, Prompt};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
/// use std::sync::Arc;
/// # use genloop_provider::LanguageModel;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Planet {
///     name: String,
///     moons: u32,
/// }
///
/// # async fn example(model: Arc<dyn LanguageModel>) -> Result<(), Box<dyn std::error::Error>> {
/// let result = GenerateObject::<Planet>::new(model, Prompt::text("describe earth"))
///     .execute()
///     .await?;
/// println!("{} has {} moon(s)", result.object.name, result.object.moons);
/// # Ok(())
/// # }
/// ```
pub struct GenerateObject<T>
where
    T: DeserializeOwned + JsonSchema,
{
    builder: GenerateText,
    _marker: PhantomData<fn() -> T>,
}

impl<T> GenerateObject<T>
where
    T: DeserializeOwned + JsonSchema,
{
    /// Creates a builder with the required model and prompt.
    pub fn new(model: Arc<dyn LanguageModel>, prompt: impl Into<Prompt>) -> Self {
        Self {
            builder: GenerateText::new(model, prompt).output(OutputSpec::object_of::<T>()),
            _marker: PhantomData,
        }
    }

    /// Sets the complete call settings.
    pub fn settings(mut self, settings: CallSettings) -> Self {
        self.builder = self.builder.settings(settings);
        self
    }

    /// Sets the system instructions.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.builder = self.builder.system(system);
        self
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.builder = self.builder.temperature(temperature);
        self
    }

    /// Sets the maximum output tokens.
    pub fn max_output_tokens(mut self, max_tokens: u32) -> Self {
        self.builder = self.builder.max_output_tokens(max_tokens);
        self
    }

    /// Sets the top_p sampling parameter.
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.builder = self.builder.top_p(top_p);
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, seed: u32) -> Self {
        self.builder = self.builder.seed(seed);
        self
    }

    /// Sets the maximum number of provider-call retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.builder = self.builder.max_retries(max_retries);
        self
    }

    /// Sets the cancellation signal.
    pub fn abort_signal(mut self, signal: CancellationToken) -> Self {
        self.builder = self.builder.abort_signal(signal);
        self
    }

    /// Sets the deadline configuration.
    pub fn timeout(mut self, timeouts: TimeoutConfig) -> Self {
        self.builder = self.builder.timeout(timeouts);
        self
    }

    /// Sets which raw payloads are retained on the result.
    pub fn retention(mut self, retention: RetentionConfig) -> Self {
        self.builder = self.builder.retention(retention);
        self
    }

    /// Sets namespaced provider options.
    pub fn provider_options(mut self, options: ProviderOptions) -> Self {
        self.builder = self.builder.provider_options(options);
        self
    }

    /// Runs the generation and deserializes the parsed output.
    pub async fn execute(self) -> Result<GenerateObjectResult<T>, EngineError> {
        let result = self.builder.execute().await?;

        let value = result.output.clone().ok_or_else(|| {
            EngineError::no_object_generated(
                "output specification produced no value",
                result.text.clone(),
                result.total_usage.clone(),
                result.finish_reason,
                None,
            )
        })?;
        let object: T = serde_json::from_value(value).map_err(|e| {
            EngineError::no_object_generated(
                format!("failed to deserialize output: {e}"),
                result.text.clone(),
                result.total_usage.clone(),
                result.finish_reason,
                None,
            )
        })?;

        Ok(GenerateObjectResult {
            object,
            text: result.text,
            finish_reason: result.finish_reason,
            usage: result.total_usage,
            warnings: result.warnings,
            raw_request: result.raw_request,
            raw_response: result.raw_response,
        })
    }
}

/// A typed object plus the metadata of the run that produced it.
#[derive(Debug, Clone)]
pub struct GenerateObjectResult<T> {
    /// The parsed, schema-validated object.
    pub object: T,

    /// The raw text the model produced.
    pub text: String,

    /// The finish reason of the final step.
    pub finish_reason: FinishReason,

    /// Usage summed over all steps.
    pub usage: Usage,

    /// Warnings collected across all steps.
    pub warnings: Vec<CallWarning>,

    /// The raw request body, when retention asked for it.
    pub raw_request: Option<Value>,

    /// The raw response body, when retention asked for it.
    pub raw_response: Option<Value>,
}
