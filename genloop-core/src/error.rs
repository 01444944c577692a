use genloop_provider::{FinishReason, ResponseMetadata, Usage};
use thiserror::Error;

/// Which deadline scope was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    /// The deadline wrapping the entire operation.
    Total,
    /// The deadline wrapping one step (provider call plus tool executions).
    PerStep,
    /// The deadline wrapping a single stream chunk read.
    PerChunk,
}

impl std::fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutScope::Total => write!(f, "total"),
            TimeoutScope::PerStep => write!(f, "per-step"),
            TimeoutScope::PerChunk => write!(f, "per-chunk"),
        }
    }
}

/// Errors surfaced by the generation engine.
///
/// Tool-level faults are not represented here: a missing tool or a failed
/// tool execution is recovered locally and encoded in the corresponding
/// `ToolResult.error`, and the loop continues.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A caller-supplied option is invalid. Never retried.
    #[error("Invalid argument for parameter '{parameter}': {message} (value: {value})")]
    InvalidArgument {
        /// The offending parameter name.
        parameter: String,
        /// The offending value, stringified.
        value: String,
        /// What is wrong with it.
        message: String,
    },

    /// The prompt is malformed (e.g. empty message list).
    #[error("Invalid prompt: {message}")]
    InvalidPrompt {
        /// What is wrong with the prompt.
        message: String,
    },

    /// The provider reported a failure; ends the operation.
    #[error("Provider '{provider}' error at step {step_number}: {message}")]
    Provider {
        /// The provider name.
        provider: String,
        /// The 1-based step in which the failure occurred.
        step_number: usize,
        /// The provider's error message.
        message: String,
    },

    /// The output specification's complete parser failed on the final text.
    #[error("No object generated: {message}")]
    NoObjectGenerated {
        /// Why parsing failed.
        message: String,
        /// The raw text the model produced.
        raw_text: String,
        /// Accumulated usage of the failed operation.
        usage: Usage,
        /// The finish reason of the final step.
        finish_reason: FinishReason,
        /// Response metadata of the final step, if available.
        response: Option<ResponseMetadata>,
    },

    /// A deadline was exceeded.
    #[error("{scope} deadline exceeded")]
    Timeout {
        /// Which deadline fired.
        scope: TimeoutScope,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The chunk stream violated its protocol (e.g. ended without a
    /// terminal finish chunk).
    #[error("Stream protocol violation: {message}")]
    StreamProtocol {
        /// What went wrong.
        message: String,
    },
}

impl EngineError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(
        parameter: impl Into<String>,
        value: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid-prompt error.
    pub fn invalid_prompt(message: impl Into<String>) -> Self {
        Self::InvalidPrompt {
            message: message.into(),
        }
    }

    /// Creates a step-scoped provider error.
    pub fn provider(
        provider: impl Into<String>,
        step_number: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            step_number,
            message: message.into(),
        }
    }

    /// Creates a no-object-generated error.
    pub fn no_object_generated(
        message: impl Into<String>,
        raw_text: impl Into<String>,
        usage: Usage,
        finish_reason: FinishReason,
        response: Option<ResponseMetadata>,
    ) -> Self {
        Self::NoObjectGenerated {
            message: message.into(),
            raw_text: raw_text.into(),
            usage,
            finish_reason,
            response,
        }
    }

    /// Creates a timeout error for the given scope.
    pub fn timeout(scope: TimeoutScope) -> Self {
        Self::Timeout { scope }
    }

    /// Creates a stream-protocol error.
    pub fn stream_protocol(message: impl Into<String>) -> Self {
        Self::StreamProtocol {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let error = EngineError::invalid_argument("temperature", f64::NAN, "must be finite");
        assert!(error.to_string().contains("temperature"));

        let error = EngineError::provider("openai", 3, "rate limited");
        assert!(error.to_string().contains("step 3"));

        let error = EngineError::timeout(TimeoutScope::PerChunk);
        assert_eq!(error.to_string(), "per-chunk deadline exceeded");
    }
}
