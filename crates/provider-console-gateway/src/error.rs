//! API error types and responses.
//!
//! Errors are rendered in the same `{success, error, kind}` shape as a failed
//! [`ActionResult`], so clients handle one body format.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use provider_console_core::{ActionResult, ErrorKind};
use thiserror::Error;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A console operation failed.
    #[error("{message}")]
    Failed {
        /// Failure classification.
        kind: ErrorKind,
        /// Error description.
        message: String,
    },
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Failed { kind, .. } => StatusCode::from_u16(kind.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Get the error kind reported to clients.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::InputInvalid,
            Self::Failed { kind, .. } => *kind,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ActionResult::failed(self.kind(), self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<ActionResult> for ApiError {
    fn from(result: ActionResult) -> Self {
        Self::Failed {
            kind: result.kind.unwrap_or(ErrorKind::Unexpected),
            message: result.error.unwrap_or_else(|| "operation failed".to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Turn an [`ActionResult`] into a response, mapping failures by kind.
///
/// # Errors
///
/// Returns `ApiError::Failed` if the result is a failure.
pub fn action_response(result: ActionResult) -> Result<Json<ActionResult>, ApiError> {
    if result.success {
        Ok(Json(result))
    } else {
        Err(result.into())
    }
}
