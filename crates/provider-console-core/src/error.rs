//! Common error classification for provider-console.
//!
//! Each crate defines its own error enum; all of them map onto [`ErrorKind`] so
//! the boundary layer can report and route failures without knowing which crate
//! raised them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller supplied an empty or malformed input (e.g. a blank credential).
    InputInvalid,
    /// The container runtime control plane could not be reached.
    RuntimeUnavailable,
    /// The target container does not exist where its presence was assumed.
    NotFound,
    /// An external process or runtime call exceeded its time bound.
    OperationTimeout,
    /// Every authentication strategy was tried and none succeeded.
    AllMethodsExhausted,
    /// Creating the provider container failed.
    CreateFailed,
    /// Updating the provider container failed part-way through.
    UpdateFailed,
    /// Anything not covered by the other kinds.
    Unexpected,
}

impl ErrorKind {
    /// Returns the stable snake_case name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InputInvalid => "input_invalid",
            Self::RuntimeUnavailable => "runtime_unavailable",
            Self::NotFound => "not_found",
            Self::OperationTimeout => "operation_timeout",
            Self::AllMethodsExhausted => "all_methods_exhausted",
            Self::CreateFailed => "create_failed",
            Self::UpdateFailed => "update_failed",
            Self::Unexpected => "unexpected",
        }
    }

    /// Returns the HTTP status code a boundary layer should use for this kind.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InputInvalid | Self::AllMethodsExhausted => 400,
            Self::NotFound => 404,
            Self::RuntimeUnavailable => 503,
            Self::OperationTimeout => 504,
            Self::CreateFailed | Self::UpdateFailed | Self::Unexpected => 500,
        }
    }

    /// Returns true if re-issuing the same request might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::RuntimeUnavailable | Self::OperationTimeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ErrorKind::InputInvalid.http_status_code(), 400);
        assert_eq!(ErrorKind::AllMethodsExhausted.http_status_code(), 400);
        assert_eq!(ErrorKind::NotFound.http_status_code(), 404);
        assert_eq!(ErrorKind::RuntimeUnavailable.http_status_code(), 503);
        assert_eq!(ErrorKind::OperationTimeout.http_status_code(), 504);
        assert_eq!(ErrorKind::UpdateFailed.http_status_code(), 500);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AllMethodsExhausted).unwrap();
        assert_eq!(json, "\"all_methods_exhausted\"");
        assert_eq!(ErrorKind::CreateFailed.to_string(), "create_failed");
    }

    #[test]
    fn retriable_kinds() {
        assert!(ErrorKind::RuntimeUnavailable.is_retriable());
        assert!(ErrorKind::OperationTimeout.is_retriable());
        assert!(!ErrorKind::InputInvalid.is_retriable());
    }
}
