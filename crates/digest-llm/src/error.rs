//! Failures surfaced by providers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// What went wrong talking to a chat-completions endpoint
#[derive(Error, Debug)]
pub enum LLMError {
    /// Non-2xx status, or an `error` object in place of `choices`
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    /// HTTP 401
    #[error("Provider rejected the API key")]
    AuthenticationFailed,

    /// HTTP 429
    #[error("Provider rate limit hit: {0}")]
    RateLimitExceeded(String),

    /// HTTP 400
    #[error("Provider refused the request: {0}")]
    InvalidRequest(String),

    /// HTTP 404, or an empty free-model catalogue
    #[error("No usable model: {0}")]
    ModelNotFound(String),

    /// Transport failure before a status line arrived
    #[cfg(feature = "openai")]
    #[error("Transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Body did not match the chat-completions or catalogue shape
    #[error("Malformed provider response: {0}")]
    UnexpectedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LLMError::ModelNotFound("no free model in the catalogue".into()).to_string(),
            "No usable model: no free model in the catalogue"
        );
        assert_eq!(
            LLMError::AuthenticationFailed.to_string(),
            "Provider rejected the API key"
        );
    }
}
