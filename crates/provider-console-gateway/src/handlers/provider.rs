//! Provider lifecycle endpoints.
//!
//! Each action answers `{success, message}` on success. Failures carry the
//! error kind and map to 503 (runtime unreachable), 504 (timeout), 404 or 500.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::info;

use provider_console_control::{ActionResult, ProviderConsole};

use crate::error::{action_response, ApiError};
use crate::state::GatewayState;

/// Start the provider, creating its container if needed.
///
/// # Errors
///
/// Returns an error response if the action fails.
pub async fn start<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<Json<ActionResult>, ApiError>
where
    C: ProviderConsole + 'static,
{
    info!(action = "start", "Provider control action");
    action_response(state.console.start_provider().await)
}

/// Stop the provider.
///
/// # Errors
///
/// Returns an error response if the action fails.
pub async fn stop<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<Json<ActionResult>, ApiError>
where
    C: ProviderConsole + 'static,
{
    info!(action = "stop", "Provider control action");
    action_response(state.console.stop_provider().await)
}

/// Restart the provider.
///
/// # Errors
///
/// Returns an error response if the action fails.
pub async fn restart<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<Json<ActionResult>, ApiError>
where
    C: ProviderConsole + 'static,
{
    info!(action = "restart", "Provider control action");
    action_response(state.console.restart_provider().await)
}

/// Pull the latest image and re-create the provider.
///
/// # Errors
///
/// Returns an error response if the action fails.
pub async fn update<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<Json<ActionResult>, ApiError>
where
    C: ProviderConsole + 'static,
{
    info!(action = "update", "Provider control action");
    action_response(state.console.update_provider().await)
}
