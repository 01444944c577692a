use crate::error::EngineError;
use genloop_provider::Headers;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Settings for language model calls: sampling parameters, retries,
/// headers, and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallSettings {
    /// Maximum number of tokens to generate.
    pub max_output_tokens: Option<u32>,

    /// Temperature setting. The range depends on the provider and model.
    pub temperature: Option<f64>,

    /// Nucleus sampling.
    pub top_p: Option<f64>,

    /// Only sample from the top K options for each subsequent token.
    pub top_k: Option<u32>,

    /// Presence penalty setting.
    pub presence_penalty: Option<f64>,

    /// Frequency penalty setting.
    pub frequency_penalty: Option<f64>,

    /// Stop sequences.
    pub stop_sequences: Option<Vec<String>>,

    /// Seed for deterministic sampling.
    pub seed: Option<u32>,

    /// Maximum number of retries of a failed provider call.
    /// Set to 0 to disable retries. Default: 2.
    pub max_retries: Option<u32>,

    /// Cancellation signal for the whole operation.
    pub abort_signal: Option<CancellationToken>,

    /// Additional HTTP headers.
    pub headers: Option<Headers>,
}

/// Validated sampling settings, ready to be copied into call options.
#[derive(Debug, Clone, Default)]
pub struct PreparedCallSettings {
    /// Maximum number of tokens to generate.
    pub max_output_tokens: Option<u32>,
    /// Temperature setting.
    pub temperature: Option<f64>,
    /// Nucleus sampling.
    pub top_p: Option<f64>,
    /// Top-K sampling.
    pub top_k: Option<u32>,
    /// Presence penalty.
    pub presence_penalty: Option<f64>,
    /// Frequency penalty.
    pub frequency_penalty: Option<f64>,
    /// Stop sequences.
    pub stop_sequences: Option<Vec<String>>,
    /// Sampling seed.
    pub seed: Option<u32>,
}

impl CallSettings {
    /// Creates default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum output tokens.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the top_p sampling parameter.
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the top_k sampling parameter.
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Sets the presence penalty.
    pub fn with_presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    /// Sets the frequency penalty.
    pub fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    /// Sets the stop sequences.
    pub fn with_stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(sequences);
        self
    }

    /// Sets the sampling seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the cancellation signal.
    pub fn with_abort_signal(mut self, abort_signal: CancellationToken) -> Self {
        self.abort_signal = Some(abort_signal);
        self
    }

    /// Sets the HTTP headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// Deadline scopes for one operation.
///
/// The three scopes nest: `total` wraps the entire facade call, `per_step`
/// wraps one provider call plus its tool executions, and `per_chunk` wraps
/// a single stream read. Every scope is independent and optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutConfig {
    /// Deadline for the entire operation.
    pub total: Option<Duration>,

    /// Deadline for a single step.
    pub per_step: Option<Duration>,

    /// Deadline for a single stream chunk read.
    pub per_chunk: Option<Duration>,
}

impl TimeoutConfig {
    /// Creates an empty configuration (no deadlines).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total deadline.
    pub fn with_total(mut self, total: Duration) -> Self {
        self.total = Some(total);
        self
    }

    /// Sets the per-step deadline.
    pub fn with_per_step(mut self, per_step: Duration) -> Self {
        self.per_step = Some(per_step);
        self
    }

    /// Sets the per-chunk deadline.
    pub fn with_per_chunk(mut self, per_chunk: Duration) -> Self {
        self.per_chunk = Some(per_chunk);
        self
    }
}

/// Which raw provider payloads are kept on the result.
///
/// Both flags default to off: raw bodies are stripped before the result is
/// returned unless explicitly retained.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionConfig {
    /// Keep the raw request body of the final step.
    pub raw_request: bool,

    /// Keep the raw response body of the final step.
    pub raw_response: bool,
}

impl RetentionConfig {
    /// Creates a configuration that strips both payloads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the raw request body.
    pub fn with_raw_request(mut self, keep: bool) -> Self {
        self.raw_request = keep;
        self
    }

    /// Keeps the raw response body.
    pub fn with_raw_response(mut self, keep: bool) -> Self {
        self.raw_response = keep;
        self
    }
}

fn require_finite(parameter: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid_argument(
            parameter,
            value,
            format!("{parameter} must be a finite number"),
        ))
    }
}

/// Validates call settings.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] when `max_output_tokens` is
/// zero or any sampling parameter is not finite.
pub fn prepare_call_settings(settings: &CallSettings) -> Result<PreparedCallSettings, EngineError> {
    if let Some(max_tokens) = settings.max_output_tokens
        && max_tokens < 1
    {
        return Err(EngineError::invalid_argument(
            "maxOutputTokens",
            max_tokens,
            "maxOutputTokens must be >= 1",
        ));
    }
    if let Some(temperature) = settings.temperature {
        require_finite("temperature", temperature)?;
    }
    if let Some(top_p) = settings.top_p {
        require_finite("topP", top_p)?;
    }
    if let Some(penalty) = settings.presence_penalty {
        require_finite("presencePenalty", penalty)?;
    }
    if let Some(penalty) = settings.frequency_penalty {
        require_finite("frequencyPenalty", penalty)?;
    }

    Ok(PreparedCallSettings {
        max_output_tokens: settings.max_output_tokens,
        temperature: settings.temperature,
        top_p: settings.top_p,
        top_k: settings.top_k,
        presence_penalty: settings.presence_penalty,
        frequency_penalty: settings.frequency_penalty,
        stop_sequences: settings.stop_sequences.clone(),
        seed: settings.seed,
    })
}
