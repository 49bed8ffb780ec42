//! The provider console service.
//!
//! This module provides the `ProviderConsole` trait, the boundary API used by
//! the gateway, and `ConsoleService`, which wires the authentication resolver,
//! lifecycle controller and stats collector together. Failures never escape as
//! errors here: mutating operations answer with an [`ActionResult`] and reads
//! degrade to placeholders.

use std::sync::Arc;

use async_trait::async_trait;
use provider_console_auth::{AuthResolver, AuthStatus};
use provider_console_core::{ActionResult, Clock};
use provider_console_runtime::ContainerRuntime;
use tracing::{info, warn};

use crate::error::ControlError;
use crate::lifecycle::LifecycleController;
use crate::stats::{StatsCollector, StatsReport};
use crate::types::{LifecycleOutcome, ProviderSettings, StatusReport};

/// Operations exposed to operators.
#[async_trait]
pub trait ProviderConsole: Send + Sync {
    // =========================================================================
    // Authentication
    // =========================================================================

    /// Authenticate the provider with a one-time code.
    async fn authenticate(&self, code: &str) -> ActionResult;

    /// Whether any authentication evidence exists.
    async fn is_authenticated(&self) -> bool;

    /// Remove stored credentials.
    async fn clear_auth(&self) -> ActionResult;

    /// Authentication state for display.
    async fn auth_status(&self) -> AuthStatus;

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the provider container.
    async fn start_provider(&self) -> ActionResult;

    /// Stop the provider container.
    async fn stop_provider(&self) -> ActionResult;

    /// Restart the provider container.
    async fn restart_provider(&self) -> ActionResult;

    /// Pull the latest image and re-create the provider container.
    async fn update_provider(&self) -> ActionResult;

    // =========================================================================
    // Observation
    // =========================================================================

    /// Container status.
    async fn container_status(&self) -> StatusReport;

    /// The last `lines` log lines, or a placeholder.
    async fn logs(&self, lines: usize) -> String;

    /// Provider statistics.
    async fn stats(&self) -> StatsReport;
}

/// The console service implementation.
pub struct ConsoleService<R: ContainerRuntime> {
    auth: Arc<AuthResolver>,
    lifecycle: LifecycleController<R>,
    stats: StatsCollector,
}

impl<R: ContainerRuntime> ConsoleService<R> {
    /// Create a new console service.
    #[must_use]
    pub fn new(
        auth: Arc<AuthResolver>,
        runtime: Arc<R>,
        settings: ProviderSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auth,
            lifecycle: LifecycleController::new(runtime, settings),
            stats: StatsCollector::new(clock),
        }
    }

    /// Get the authentication resolver.
    #[must_use]
    pub fn auth(&self) -> &AuthResolver {
        &self.auth
    }

    /// Get the lifecycle controller.
    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleController<R> {
        &self.lifecycle
    }

    /// Get the stats collector.
    #[must_use]
    pub const fn stats_collector(&self) -> &StatsCollector {
        &self.stats
    }

    fn lifecycle_result(
        action: &str,
        result: Result<LifecycleOutcome, ControlError>,
    ) -> ActionResult {
        match result {
            Ok(outcome) => {
                info!(action = %action, outcome = ?outcome, "Provider action completed");
                ActionResult::ok(outcome.message())
            }
            Err(e) => {
                warn!(action = %action, error = %e, kind = %e.kind(), "Provider action failed");
                ActionResult::failed(e.kind(), e.to_string())
            }
        }
    }
}

#[async_trait]
impl<R: ContainerRuntime + 'static> ProviderConsole for ConsoleService<R> {
    async fn authenticate(&self, code: &str) -> ActionResult {
        match self.auth.authenticate(code).await {
            Ok(outcome) => ActionResult::ok(format!(
                "Authentication successful via {}",
                outcome.method
            )),
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Authentication failed");
                ActionResult::failed(e.kind(), e.to_string())
            }
        }
    }

    async fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated().await
    }

    async fn clear_auth(&self) -> ActionResult {
        match self.auth.clear_auth() {
            Ok(removed) => ActionResult::ok(format!(
                "Cleared {} credential file(s)",
                removed.len()
            )),
            Err(e) => ActionResult::failed(e.kind(), e.to_string()),
        }
    }

    async fn auth_status(&self) -> AuthStatus {
        self.auth.auth_status().await
    }

    async fn start_provider(&self) -> ActionResult {
        Self::lifecycle_result("start", self.lifecycle.start().await)
    }

    async fn stop_provider(&self) -> ActionResult {
        Self::lifecycle_result("stop", self.lifecycle.stop().await)
    }

    async fn restart_provider(&self) -> ActionResult {
        Self::lifecycle_result("restart", self.lifecycle.restart().await)
    }

    async fn update_provider(&self) -> ActionResult {
        let result = self.lifecycle.update().await;
        // Whatever was cached describes the old container.
        self.stats.clear_cache();
        Self::lifecycle_result("update", result)
    }

    async fn container_status(&self) -> StatusReport {
        self.lifecycle.status().await
    }

    async fn logs(&self, lines: usize) -> String {
        self.lifecycle.logs(lines).await
    }

    async fn stats(&self) -> StatsReport {
        self.stats
            .report(
                self.lifecycle.runtime(),
                &self.lifecycle.settings().container_name,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_console_auth::{AuthConfig, MockProcessRunner, ProbeTimings};
    use provider_console_core::{ErrorKind, ManualClock};
    use provider_console_runtime::{ContainerState, MockRuntime};
    use provider_console_store::FsCredentialStore;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        service: ConsoleService<MockRuntime>,
        runtime: Arc<MockRuntime>,
        _dir: TempDir,
    }

    fn fixture(runtime: MockRuntime) -> Fixture {
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
            Arc::new(MockProcessRunner::new()),
            clock.clone(),
            Vec::new(),
        );
        let runtime = Arc::new(runtime);
        let settings = ProviderSettings {
            config_dir,
            ..ProviderSettings::default()
        };
        Fixture {
            service: ConsoleService::new(Arc::new(auth), Arc::clone(&runtime), settings, clock),
            runtime,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn authenticate_and_clear() {
        let fx = fixture(MockRuntime::new());
        assert!(!fx.service.is_authenticated().await);

        let result = fx.service.authenticate(&"z".repeat(60)).await;
        assert!(result.success, "{result:?}");
        assert!(fx.service.is_authenticated().await);

        let cleared = fx.service.clear_auth().await;
        assert!(cleared.success);
        assert_eq!(cleared.message.as_deref(), Some("Cleared 2 credential file(s)"));
    }

    #[tokio::test]
    async fn blank_code_is_input_invalid() {
        let fx = fixture(MockRuntime::new());
        let result = fx.service.authenticate("  ").await;
        assert!(!result.success);
        assert_eq!(result.kind, Some(ErrorKind::InputInvalid));
        assert_eq!(result.http_status_code(), 400);
    }

    #[tokio::test]
    async fn exhausted_methods_are_reported() {
        let fx = fixture(MockRuntime::new());
        let result = fx.service.authenticate("too-short").await;
        assert_eq!(result.kind, Some(ErrorKind::AllMethodsExhausted));
        assert!(result.error.unwrap().contains("manual_fallback"));
    }

    #[tokio::test]
    async fn lifecycle_results() {
        let fx = fixture(MockRuntime::new());
        let started = fx.service.start_provider().await;
        assert!(started.success);
        assert!(started.message.unwrap().starts_with("Provider container created"));

        let stopped = fx.service.stop_provider().await;
        assert_eq!(stopped.message.as_deref(), Some("Provider stopped"));

        let again = fx.service.stop_provider().await;
        assert_eq!(again.message.as_deref(), Some("Provider is not running"));

        assert!(fx.service.restart_provider().await.success);
        assert!(fx.service.update_provider().await.success);
        assert!(fx.service.container_status().await.is_running());
    }

    #[tokio::test]
    async fn unreachable_runtime_maps_to_503() {
        let fx = fixture(MockRuntime::unreachable());
        let result = fx.service.start_provider().await;
        assert_eq!(result.kind, Some(ErrorKind::RuntimeUnavailable));
        assert_eq!(result.http_status_code(), 503);

        assert_eq!(fx.service.container_status().await.status, "runtime_unavailable");
        assert!(!fx.service.logs(10).await.is_empty());
        assert!(fx.service.stats().await.last_update.is_none());
    }

    #[tokio::test]
    async fn stats_follow_container() {
        let fx = fixture(MockRuntime::new());
        fx.runtime
            .insert_container("urnetwork-provider", "img", ContainerState::Running);
        fx.runtime
            .set_logs("urnetwork-provider", "instance_id: beef\n");

        let report = fx.service.stats().await;
        assert_eq!(report.stats.instance_id, "beef");
        assert!(report.last_update.is_some());

        fx.service.update_provider().await;
        assert!(fx.service.stats_collector().cached().is_none());
    }
}
