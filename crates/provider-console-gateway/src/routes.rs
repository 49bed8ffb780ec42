//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use provider_console_control::ProviderConsole;

use crate::handlers::{auth, provider, status};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Gateway liveness
/// - `GET /api/auth` - Authentication status
/// - `POST /api/auth` - Authenticate with `{"auth_code": "..."}`
/// - `DELETE /api/auth` - Clear credentials
/// - `POST /api/provider/start` - Start (or create) the provider
/// - `POST /api/provider/stop` - Stop the provider
/// - `POST /api/provider/restart` - Restart the provider
/// - `POST /api/provider/update` - Pull the image and re-create the provider
/// - `GET /api/status` - Container status and statistics
/// - `GET /api/logs?lines=N` - Recent provider logs
/// - `GET /api/stats` - Provider statistics
///
/// Only the read-only routes carry the request timeout. Authentication and
/// provider actions are bounded by their own process and runtime timeouts.
pub fn create_router<C>(state: GatewayState<C>) -> Router
where
    C: ProviderConsole + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();
    let state = Arc::new(state);

    let actions = Router::new()
        .route(
            "/api/auth",
            get(auth::get_status::<C>)
                .post(auth::authenticate::<C>)
                .delete(auth::clear::<C>),
        )
        .route("/api/provider/start", post(provider::start::<C>))
        .route("/api/provider/stop", post(provider::stop::<C>))
        .route("/api/provider/restart", post(provider::restart::<C>))
        .route("/api/provider/update", post(provider::update::<C>));

    let reads = Router::new()
        .route("/health", get(status::health))
        .route("/api/status", get(status::get_status::<C>))
        .route("/api/logs", get(status::get_logs::<C>))
        .route("/api/stats", get(status::get_stats::<C>))
        .layer(TimeoutLayer::new(request_timeout));

    actions
        .merge(reads)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Build the CORS layer from configured origins. Unparseable origins are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use provider_console_auth::{
        AuthConfig, AuthMethod, AuthResolver, CommandOutput, CommandSpec, MethodKind,
        MockProcessRunner, ProbeTimings, ProcessError, ProcessRunner,
    };
    use provider_console_control::{ConsoleService, ProviderSettings};
    use provider_console_core::ManualClock;
    use provider_console_runtime::{ContainerState, MockRuntime, Operation};
    use provider_console_store::FsCredentialStore;

    use crate::config::GatewayConfig;

    const CONTAINER: &str = "urnetwork-provider";

    struct Fixture {
        server: TestServer,
        runtime: Arc<MockRuntime>,
        clock: Arc<ManualClock>,
        config_dir: std::path::PathBuf,
        _dir: TempDir,
    }

    fn fixture(runtime: MockRuntime) -> Fixture {
        fixture_with(
            runtime,
            Arc::new(MockProcessRunner::new()),
            Vec::new(),
            GatewayConfig {
                max_log_lines: 500,
                ..GatewayConfig::default()
            },
        )
    }

    fn fixture_with(
        runtime: MockRuntime,
        runner: Arc<dyn ProcessRunner>,
        methods: Vec<AuthMethod>,
        config: GatewayConfig,
    ) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".urnetwork");
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let store = Arc::new(FsCredentialStore::open(&config_dir).unwrap());
        let auth = AuthResolver::with_methods(
            AuthConfig {
                config_dir: config_dir.clone(),
                clear_settle: Duration::ZERO,
                timings: ProbeTimings::immediate(),
                ..AuthConfig::default()
            },
            store,
            runner,
            clock.clone(),
            methods,
        );
        let runtime = Arc::new(runtime);
        let settings = ProviderSettings {
            config_dir: config_dir.clone(),
            ..ProviderSettings::default()
        };
        let console =
            ConsoleService::new(Arc::new(auth), Arc::clone(&runtime), settings, clock.clone());
        let app = create_router(GatewayState::new(Arc::new(console), config));
        Fixture {
            server: TestServer::new(app).unwrap(),
            runtime,
            clock,
            config_dir,
            _dir: dir,
        }
    }

    /// A client that never answers before its command bound runs out.
    struct HangingRunner;

    #[async_trait::async_trait]
    impl ProcessRunner for HangingRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
            tokio::time::sleep(spec.timeout).await;
            Err(ProcessError::Timeout {
                program: spec.program.clone(),
                timeout: spec.timeout,
            })
        }
    }

    #[test]
    fn cors_layers_build() {
        let _any = build_cors_layer(&["*".to_string()]);
        let _listed = build_cors_layer(&[
            "http://homeassistant.local:8123".to_string(),
            "not a header value\n".to_string(),
        ]);
    }

    #[tokio::test]
    async fn health_is_static() {
        let fx = fixture(MockRuntime::unreachable());
        let response = fx.server.get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(fx.runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn auth_status_starts_unauthenticated() {
        let fx = fixture(MockRuntime::new());
        let body: Value = fx.server.get("/api/auth").await.json();
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["available_methods"], json!(["manual_fallback"]));
    }

    #[tokio::test]
    async fn authenticate_then_clear() {
        let fx = fixture(MockRuntime::new());

        let response = fx
            .server
            .post("/api/auth")
            .json(&json!({ "auth_code": "c".repeat(64) }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Authentication successful via manual_fallback");

        let status: Value = fx.server.get("/api/auth").await.json();
        assert_eq!(status["authenticated"], true);

        let cleared = fx.server.delete("/api/auth").await;
        cleared.assert_status_ok();
        let status: Value = fx.server.get("/api/auth").await.json();
        let names: Vec<&Value> = status["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| &f["name"])
            .collect();
        assert_eq!(names, vec![&json!("auth_info.json")]);
        // The kept record is still fresh evidence.
        assert_eq!(status["authenticated"], true);

        fx.clock.advance(chrono::Duration::hours(25));
        let status: Value = fx.server.get("/api/auth").await.json();
        assert_eq!(status["authenticated"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_client_still_reaches_manual_fallback() {
        let fx = fixture_with(
            MockRuntime::new(),
            Arc::new(HangingRunner),
            vec![AuthMethod::new(
                MethodKind::DirectBinary,
                "/usr/local/bin/urnetwork",
            )],
            GatewayConfig {
                request_timeout_seconds: 30,
                ..GatewayConfig::default()
            },
        );
        std::fs::write(fx.config_dir.join("jwt"), b"previous").unwrap();

        let started = tokio::time::Instant::now();
        let response = fx
            .server
            .post("/api/auth")
            .json(&json!({ "auth_code": "c".repeat(64) }))
            .await;
        response.assert_status_ok();
        assert!(started.elapsed() >= Duration::from_secs(300));

        let body: Value = response.json();
        assert_eq!(body["message"], "Authentication successful via manual_fallback");

        let status: Value = fx.server.get("/api/auth").await.json();
        assert_eq!(status["authenticated"], true);
        assert_eq!(status["last_info"]["method"], "manual_fallback");
        assert_ne!(std::fs::read(fx.config_dir.join("jwt")).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn blank_code_is_bad_request() {
        let fx = fixture(MockRuntime::new());
        let response = fx
            .server
            .post("/api/auth")
            .json(&json!({ "auth_code": "  " }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "input_invalid");
    }

    #[tokio::test]
    async fn missing_code_field_is_bad_request() {
        let fx = fixture(MockRuntime::new());
        let response = fx.server.post("/api/auth").json(&json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let fx = fixture(MockRuntime::new());
        let response = fx.server.post("/api/auth").text("auth_code=abc").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "input_invalid");
    }

    #[tokio::test]
    async fn exhausted_methods_are_bad_request() {
        let fx = fixture(MockRuntime::new());
        let response = fx
            .server
            .post("/api/auth")
            .json(&json!({ "auth_code": "too-short" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "all_methods_exhausted");
    }

    #[tokio::test]
    async fn start_creates_container() {
        let fx = fixture(MockRuntime::new());
        let response = fx.server.post("/api/provider/start").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Provider container created and started"));
        assert_eq!(fx.runtime.state_of(CONTAINER), Some(ContainerState::Running));
    }

    #[tokio::test]
    async fn stop_when_absent_is_success() {
        let fx = fixture(MockRuntime::new());
        let response = fx.server.post("/api/provider/stop").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Provider is not running");
    }

    #[tokio::test]
    async fn restart_missing_container_creates_it() {
        let fx = fixture(MockRuntime::new());
        let response = fx.server.post("/api/provider/restart").await;
        response.assert_status_ok();
        assert_eq!(fx.runtime.container_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_runtime_is_service_unavailable() {
        let fx = fixture(MockRuntime::unreachable());
        let response = fx.server.post("/api/provider/start").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["kind"], "runtime_unavailable");
    }

    #[tokio::test]
    async fn update_pull_failure_is_server_error() {
        let runtime = MockRuntime::new();
        runtime.insert_container(CONTAINER, "old", ContainerState::Running);
        runtime.fail_on(Operation::Pull);
        let fx = fixture(runtime);

        let response = fx.server.post("/api/provider/update").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["kind"], "update_failed");
    }

    #[tokio::test]
    async fn status_reports_missing_container() {
        let fx = fixture(MockRuntime::new());
        let response = fx.server.get("/api/status").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"]["status"], "not_found");
        assert_eq!(body["stats"]["uptime"], "unknown");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn status_survives_unreachable_runtime() {
        let fx = fixture(MockRuntime::unreachable());
        let body: Value = fx.server.get("/api/status").await.json();
        assert_eq!(body["status"]["status"], "runtime_unavailable");
    }

    #[tokio::test]
    async fn logs_are_tailed_and_clamped() {
        let runtime = MockRuntime::new();
        runtime.insert_container(CONTAINER, "img", ContainerState::Running);
        let logs: String = (0..600).map(|i| format!("line {i}\n")).collect();
        runtime.set_logs(CONTAINER, logs);
        let fx = fixture(runtime);

        let body: Value = fx
            .server
            .get("/api/logs")
            .add_query_param("lines", 100_000)
            .await
            .json();
        let text = body["logs"].as_str().unwrap();
        assert_eq!(text.lines().count(), 500);
        assert!(text.ends_with("line 599\n"));

        let body: Value = fx
            .server
            .get("/api/logs")
            .add_query_param("lines", 2)
            .await
            .json();
        assert_eq!(body["logs"], "line 598\nline 599\n");
    }

    #[tokio::test]
    async fn logs_placeholder_when_absent() {
        let fx = fixture(MockRuntime::new());
        let body: Value = fx.server.get("/api/logs").await.json();
        assert_eq!(
            body["logs"],
            "Provider container does not exist or has not been started"
        );
    }

    #[tokio::test]
    async fn stats_include_last_update() {
        let runtime = MockRuntime::new();
        runtime.insert_container(CONTAINER, "img", ContainerState::Exited);
        let fx = fixture(runtime);

        let body: Value = fx.server.get("/api/stats").await.json();
        assert_eq!(body["stats"]["uptime"], "unknown");
        assert_eq!(body["stats"]["total_earnings"], "0.00");
        assert_eq!(body["last_update"], "2023-11-14T22:13:20Z");
    }
}
