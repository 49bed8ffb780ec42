//! Authentication error types.

use provider_console_core::ErrorKind;
use provider_console_store::StoreError;
use thiserror::Error;

use crate::process::ProcessError;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The submitted code was empty after trimming.
    #[error("authentication code must not be empty")]
    EmptyCredential,

    /// Every discovered method was tried and none produced credentials.
    #[error("all authentication methods failed (tried: {})", attempted.join(", "))]
    AllMethodsExhausted {
        /// Names of the methods that were tried, in order.
        attempted: Vec<String>,
    },

    /// The configuration directory could not be read or written.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// An external status check could not be run.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

impl AuthError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCredential => ErrorKind::InputInvalid,
            Self::AllMethodsExhausted { .. } => ErrorKind::AllMethodsExhausted,
            Self::Store(e) => e.kind(),
            Self::Process(ProcessError::Timeout { .. }) => ErrorKind::OperationTimeout,
            Self::Process(ProcessError::Spawn { .. }) => ErrorKind::Unexpected,
        }
    }

    /// Returns `true` if submitting the same request again might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }
}
