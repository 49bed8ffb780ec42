//! Authentication endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use provider_console_control::{ActionResult, AuthStatus, ProviderConsole};

use crate::error::{action_response, ApiError};
use crate::state::GatewayState;

/// Body of `POST /api/auth`.
#[derive(Debug, Deserialize)]
pub struct AuthBody {
    /// The one-time authentication code.
    #[serde(default)]
    pub auth_code: String,
}

/// Report the authentication state.
///
/// ```text
/// GET /api/auth
///
/// Response: 200 OK
/// {
///   "authenticated": true,
///   "config_path": "/addon_config/.urnetwork",
///   "files": [{"name": "jwt", "size": 412}],
///   "last_info": {"method": "direct_binary", ...},
///   "available_methods": ["direct_binary", "manual_fallback"]
/// }
/// ```
pub async fn get_status<C>(State(state): State<Arc<GatewayState<C>>>) -> Json<AuthStatus>
where
    C: ProviderConsole + 'static,
{
    Json(state.console.auth_status().await)
}

/// Authenticate with a one-time code.
///
/// # Errors
///
/// Returns 400 for a malformed body, a blank code, or when every method
/// fails; other failures map by kind.
pub async fn authenticate<C>(
    State(state): State<Arc<GatewayState<C>>>,
    body: Result<Json<AuthBody>, JsonRejection>,
) -> Result<Json<ActionResult>, ApiError>
where
    C: ProviderConsole + 'static,
{
    let Json(body) = body?;
    info!("Processing authentication request");
    action_response(state.console.authenticate(&body.auth_code).await)
}

/// Remove stored credentials.
///
/// # Errors
///
/// Returns 500 if the configuration directory cannot be cleared.
pub async fn clear<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<Json<ActionResult>, ApiError>
where
    C: ProviderConsole + 'static,
{
    action_response(state.console.clear_auth().await)
}
