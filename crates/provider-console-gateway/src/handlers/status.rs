//! Health, status, log and statistics endpoints.
//!
//! None of these fail: runtime problems show up inside the response body.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use provider_console_control::{ProviderConsole, StatsReport, StatsSnapshot, StatusReport};

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the gateway serves requests.
    pub status: &'static str,
    /// Gateway version.
    pub version: &'static str,
}

/// Liveness of the gateway itself. Does not touch the runtime.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Response for `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Container status.
    pub status: StatusReport,
    /// Provider statistics.
    pub stats: StatsSnapshot,
    /// When the statistics were last refreshed.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Container status together with statistics.
pub async fn get_status<C>(State(state): State<Arc<GatewayState<C>>>) -> Json<StatusResponse>
where
    C: ProviderConsole + 'static,
{
    let status = state.console.container_status().await;
    let report = state.console.stats().await;
    Json(StatusResponse {
        status,
        stats: report.stats,
        timestamp: report.last_update,
    })
}

/// Query parameters for log retrieval.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Number of lines to retrieve (default: 100).
    #[serde(default = "default_lines")]
    pub lines: usize,
}

const fn default_lines() -> usize {
    100
}

/// Response for `GET /api/logs`.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// Log text, or a placeholder explaining why there is none.
    pub logs: String,
}

/// The last `lines` log lines, capped by configuration.
pub async fn get_logs<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Query(query): Query<LogQuery>,
) -> Json<LogsResponse>
where
    C: ProviderConsole + 'static,
{
    let lines = query.lines.clamp(1, state.config.max_log_lines);
    Json(LogsResponse {
        logs: state.console.logs(lines).await,
    })
}

/// Provider statistics with their refresh time.
pub async fn get_stats<C>(State(state): State<Arc<GatewayState<C>>>) -> Json<StatsReport>
where
    C: ProviderConsole + 'static,
{
    Json(state.console.stats().await)
}
