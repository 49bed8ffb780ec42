//! Error types for the runtime crate.

use provider_console_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur while talking to the container runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime control plane could not be reached.
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    /// The named container (or image) does not exist.
    #[error("Container not found: {0}")]
    NotFound(String),

    /// The call exceeded the transport timeout.
    #[error("Container runtime call timed out: {0}")]
    Timeout(String),

    /// The runtime answered with an error.
    #[error("Container runtime error ({status_code}): {message}")]
    Failed {
        /// Status code reported by the runtime.
        status_code: u16,
        /// Error message reported by the runtime.
        message: String,
    },
}

impl RuntimeError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::RuntimeUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout(_) => ErrorKind::OperationTimeout,
            Self::Failed { .. } => ErrorKind::Unexpected,
        }
    }

    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }

    /// Returns true if the target does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }
}

impl From<bollard::errors::Error> for RuntimeError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as DockerError;

        match err {
            DockerError::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::NotFound(message),
            DockerError::DockerResponseServerError {
                status_code,
                message,
            } => Self::Failed {
                status_code,
                message,
            },
            DockerError::RequestTimeoutError => Self::Timeout("request timed out".to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// A specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
