//! Error types for the lifecycle controller.

use provider_console_core::ErrorKind;
use provider_console_runtime::RuntimeError;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while managing the provider container.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The runtime did not answer the reachability check.
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Creating or starting a new container failed.
    #[error("failed to create provider container: {cause}")]
    CreateFailed {
        /// What went wrong.
        cause: String,
    },

    /// An update step before re-creation failed. The old container may be gone.
    #[error("failed to update provider during {step}: {cause}")]
    UpdateFailed {
        /// The step that failed (`stop`, `remove` or `pull`).
        step: &'static str,
        /// What went wrong.
        cause: String,
    },

    /// Any other runtime failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ControlError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RuntimeUnavailable(_) => ErrorKind::RuntimeUnavailable,
            Self::CreateFailed { .. } => ErrorKind::CreateFailed,
            Self::UpdateFailed { .. } => ErrorKind::UpdateFailed,
            Self::Runtime(e) => e.kind(),
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ControlError::RuntimeUnavailable("refused".into()).http_status_code(),
            503
        );
        assert_eq!(
            ControlError::CreateFailed {
                cause: "conflict".into()
            }
            .http_status_code(),
            500
        );
        assert_eq!(
            ControlError::Runtime(RuntimeError::NotFound("gone".into())).http_status_code(),
            404
        );
        assert_eq!(
            ControlError::Runtime(RuntimeError::Timeout("slow".into())).kind(),
            ErrorKind::OperationTimeout
        );
    }

    #[test]
    fn update_failure_names_step() {
        let err = ControlError::UpdateFailed {
            step: "pull",
            cause: "manifest unknown".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UpdateFailed);
        assert_eq!(
            err.to_string(),
            "failed to update provider during pull: manifest unknown"
        );
        assert!(!err.is_retriable());
    }
}
