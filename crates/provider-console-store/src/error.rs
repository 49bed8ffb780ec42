//! Error types for the credential store.

use std::path::PathBuf;

use provider_console_core::ErrorKind;
use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The metadata record could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A credential file name would escape the configuration directory.
    #[error("invalid credential file name: {0}")]
    InvalidName(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_) => ErrorKind::InputInvalid,
            Self::Io { .. } | Self::Serialization(_) => ErrorKind::Unexpected,
        }
    }
}
