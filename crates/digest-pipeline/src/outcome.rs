//! Per-step results
//!
//! Every pipeline step reports one of three shapes so the orchestrator can
//! decide fatality explicitly instead of relying on swallowed errors.

use crate::error::DigestError;

/// Result of one pipeline step
#[derive(Debug)]
pub enum StepOutcome<T> {
    /// The step produced everything it was asked for
    Complete(T),

    /// The step produced partial data; `warnings` says what is missing
    Degraded { value: T, warnings: Vec<String> },

    /// The step produced nothing usable
    Failed(DigestError),
}

impl<T> StepOutcome<T> {
    /// `Complete` when no warnings were collected, `Degraded` otherwise
    pub fn from_parts(value: T, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Self::Complete(value)
        } else {
            Self::Degraded { value, warnings }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Warnings, with a failure rendered as a single warning
    pub fn warnings(&self) -> Vec<String> {
        match self {
            Self::Complete(_) => Vec::new(),
            Self::Degraded { warnings, .. } => warnings.clone(),
            Self::Failed(err) => vec![err.to_string()],
        }
    }

    /// The produced value, `None` on failure
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Split into value and warnings, treating failure as non-fatal
    pub fn into_parts(self) -> (Option<T>, Vec<String>) {
        match self {
            Self::Complete(value) => (Some(value), Vec::new()),
            Self::Degraded { value, warnings } => (Some(value), warnings),
            Self::Failed(err) => (None, vec![err.to_string()]),
        }
    }

    /// Convert to a `Result`, keeping degraded data as success
    pub fn into_result(self) -> Result<T, DigestError> {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => Ok(value),
            Self::Failed(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, DigestError>> for StepOutcome<T> {
    fn from(result: Result<T, DigestError>) -> Self {
        match result {
            Ok(value) => Self::Complete(value),
            Err(err) => Self::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        assert!(StepOutcome::from_parts(1, vec![]).is_complete());

        let degraded = StepOutcome::from_parts(1, vec!["ETHUSDT skipped".to_string()]);
        assert!(!degraded.is_complete());
        assert_eq!(degraded.value(), Some(&1));
        assert_eq!(degraded.warnings(), vec!["ETHUSDT skipped"]);
    }

    #[test]
    fn test_failed_parts() {
        let failed: StepOutcome<u8> = StepOutcome::Failed(DigestError::Upload("403".into()));
        assert!(failed.is_failed());
        let (value, warnings) = failed.into_parts();
        assert!(value.is_none());
        assert_eq!(warnings, vec!["Upload error: 403"]);
    }

    #[test]
    fn test_into_result() {
        let degraded = StepOutcome::Degraded {
            value: "partial",
            warnings: vec!["w".into()],
        };
        assert_eq!(degraded.into_result().unwrap(), "partial");

        let failed: StepOutcome<()> = Err(DigestError::Notify("down".into())).into();
        assert!(matches!(failed.into_result(), Err(DigestError::Notify(_))));
    }
}
