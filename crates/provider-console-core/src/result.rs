//! The uniform result shape returned by mutating operations.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Outcome of a mutating operation, as reported to the boundary layer.
///
/// Successful results carry a human-readable `message`; failures carry an
/// `error` string and the [`ErrorKind`] it was classified as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable description of what happened (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error description (failure only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification (failure only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ActionResult {
    /// A successful result with the given message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            kind: None,
        }
    }

    /// A failed result of the given kind.
    #[must_use]
    pub fn failed(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            kind: Some(kind),
        }
    }

    /// HTTP status a boundary layer should answer with.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind {
            Some(kind) if !self.success => kind.http_status_code(),
            _ => 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_result_omits_error_fields() {
        let json = serde_json::to_value(ActionResult::ok("done")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "message": "done"}));
    }

    #[test]
    fn failed_result_carries_kind() {
        let result = ActionResult::failed(ErrorKind::NotFound, "container missing");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "container missing",
                "kind": "not_found"
            })
        );
        assert_eq!(result.http_status_code(), 404);
        assert_eq!(ActionResult::ok("x").http_status_code(), 200);
    }
}
