//! Generation backend error types.

use toolmate_planner::PlannerError;

/// Errors raised while talking to a model provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request failed or the provider returned a non-success status.
    #[error("llm request failed: {reason}")]
    RequestFailed { reason: String },

    /// The response body was not the JSON shape the provider documents.
    #[error("llm response parse error: {reason}")]
    ResponseParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// The provider answered without any text content.
    #[error("{provider} returned no text content")]
    EmptyCompletion { provider: String },

    /// A provider name in configuration is not recognised.
    #[error("unknown llm provider: {name}")]
    UnknownProvider { name: String },
}

/// Convenience alias used throughout the llm crate.
pub type Result<T> = std::result::Result<T, LlmError>;

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            reason: err.to_string(),
        }
    }
}

impl From<LlmError> for PlannerError {
    fn from(err: LlmError) -> Self {
        PlannerError::BackendFailure {
            reason: err.to_string(),
        }
    }
}
