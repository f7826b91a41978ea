//! Error types for digest operations

use thiserror::Error;

/// Digest pipeline errors
///
/// Only [`DigestError::Generation`], [`DigestError::Config`] and
/// [`DigestError::InvalidDate`] end a run. The orchestrator downgrades
/// everything else to a warning.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Market, news or snapshot retrieval failed
    #[error("Fetch error ({origin}): {reason}")]
    Fetch {
        origin: String,
        reason: String,
    },

    /// The language model produced no usable copy
    #[error("Generation error: {0}")]
    Generation(String),

    /// Object storage upload or presigning failed
    #[error("Upload error: {0}")]
    Upload(String),

    /// Push notification failed
    #[error("Notify error: {0}")]
    Notify(String),

    /// Configuration missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Date not in YYYYMMDD form
    #[error("Invalid date '{0}': expected YYYYMMDD")]
    InvalidDate(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl DigestError {
    /// Shorthand for a [`DigestError::Fetch`]
    pub fn fetch(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the run with a non-zero exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::Config(_) | Self::InvalidDate(_) | Self::Template(_)
        )
    }
}

/// Result type alias for digest operations
pub type Result<T> = std::result::Result<T, DigestError>;

/// LLM failures are generation failures
impl From<digest_llm::LLMError> for DigestError {
    fn from(err: digest_llm::LLMError) -> Self {
        DigestError::Generation(err.to_string())
    }
}
