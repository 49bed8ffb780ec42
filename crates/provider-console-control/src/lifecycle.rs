//! Provider container lifecycle.
//!
//! Every mutating operation first checks that the runtime answers, then acts
//! on the container's current state:
//!
//! ```text
//!             absent            present, stopped      running
//! start       create            start                 (already running)
//! stop        (already stopped) (already stopped)     stop
//! restart     start             restart               restart
//! update      pull, create      stop, remove, pull, create
//! ```

use std::sync::Arc;

use provider_console_runtime::{ContainerDetails, ContainerRuntime, ResourceSample, RuntimeError};
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::types::{LifecycleOutcome, ProviderSettings, StatusReport};

/// Manages the single provider container.
pub struct LifecycleController<R: ContainerRuntime> {
    runtime: Arc<R>,
    settings: ProviderSettings,
}

impl<R: ContainerRuntime> LifecycleController<R> {
    /// Create a controller for the container described by `settings`.
    #[must_use]
    pub fn new(runtime: Arc<R>, settings: ProviderSettings) -> Self {
        Self { runtime, settings }
    }

    /// Get a reference to the runtime.
    #[must_use]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Get the provider settings.
    #[must_use]
    pub const fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        &self.settings.container_name
    }

    async fn ensure_reachable(&self) -> Result<()> {
        self.runtime.ping().await.map_err(|e| {
            warn!(error = %e, "Container runtime unreachable");
            ControlError::RuntimeUnavailable(e.to_string())
        })
    }

    /// Inspect the container, mapping absence to `None`.
    async fn find(&self) -> Result<Option<ContainerDetails>> {
        match self.runtime.inspect(self.name()).await {
            Ok(details) => Ok(Some(details)),
            Err(e) if e.is_not_found() => {
                debug!(container = %self.name(), "Container not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the provider, creating the container if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RuntimeUnavailable` if the runtime does not answer,
    /// `ControlError::CreateFailed` if a new container cannot be created, or
    /// `ControlError::Runtime` if starting fails.
    pub async fn start(&self) -> Result<LifecycleOutcome> {
        self.ensure_reachable().await?;

        match self.find().await? {
            None => {
                info!(container = %self.name(), "Creating new provider container");
                self.create().await
            }
            Some(details) if details.state.is_running() => Ok(LifecycleOutcome::AlreadyRunning),
            Some(details) => {
                info!(container = %self.name(), state = %details.state.as_str(), "Starting existing container");
                self.runtime.start(self.name()).await?;
                Ok(LifecycleOutcome::Started)
            }
        }
    }

    /// Stop the provider if it is running.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RuntimeUnavailable` if the runtime does not answer,
    /// or `ControlError::Runtime` if stopping fails.
    pub async fn stop(&self) -> Result<LifecycleOutcome> {
        self.ensure_reachable().await?;

        match self.find().await? {
            Some(details) if details.state.is_running() => {
                info!(container = %self.name(), "Stopping provider container");
                self.runtime.stop(self.name()).await?;
                Ok(LifecycleOutcome::Stopped)
            }
            _ => Ok(LifecycleOutcome::AlreadyStopped),
        }
    }

    /// Restart the provider, starting it if the container does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RuntimeUnavailable` if the runtime does not answer,
    /// or whatever [`start`](Self::start) or the restart call returns.
    pub async fn restart(&self) -> Result<LifecycleOutcome> {
        self.ensure_reachable().await?;

        if self.find().await?.is_none() {
            return self.start().await;
        }

        info!(container = %self.name(), "Restarting provider container");
        self.runtime.restart(self.name()).await?;
        Ok(LifecycleOutcome::Restarted)
    }

    /// Replace the container with one running a freshly pulled image.
    ///
    /// There is no rollback: if a step fails after the old container was
    /// removed, the provider stays absent until the next start.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RuntimeUnavailable` if the runtime does not answer,
    /// `ControlError::UpdateFailed` if stopping, removing or pulling fails, or
    /// `ControlError::CreateFailed` if the new container cannot be created.
    pub async fn update(&self) -> Result<LifecycleOutcome> {
        self.ensure_reachable().await?;
        info!(container = %self.name(), image = %self.settings.image, "Updating provider");

        let update_failed = |step: &'static str| {
            move |e: RuntimeError| ControlError::UpdateFailed {
                step,
                cause: e.to_string(),
            }
        };

        let existing = self.find().await.map_err(|e| ControlError::UpdateFailed {
            step: "inspect",
            cause: e.to_string(),
        })?;
        if existing.is_some() {
            self.runtime
                .stop(self.name())
                .await
                .map_err(update_failed("stop"))?;
            self.runtime
                .remove(self.name())
                .await
                .map_err(update_failed("remove"))?;
            debug!(container = %self.name(), "Old container removed");
        }

        self.runtime
            .pull_image(&self.settings.image)
            .await
            .map_err(update_failed("pull"))?;

        self.create().await
    }

    /// Create and start a new provider container.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::CreateFailed` if the configuration directory
    /// cannot be created or the runtime rejects the container.
    pub async fn create(&self) -> Result<LifecycleOutcome> {
        let create_failed = |cause: String| {
            warn!(container = %self.name(), cause = %cause, "Failed to create provider container");
            ControlError::CreateFailed { cause }
        };

        tokio::fs::create_dir_all(&self.settings.config_dir)
            .await
            .map_err(|e| {
                create_failed(format!(
                    "cannot create {}: {e}",
                    self.settings.config_dir.display()
                ))
            })?;

        let spec = self.settings.container_spec();
        debug!(spec = ?spec, "Creating container");
        let id = self
            .runtime
            .create(&spec)
            .await
            .map_err(|e| create_failed(e.to_string()))?;
        self.runtime
            .start(self.name())
            .await
            .map_err(|e| create_failed(e.to_string()))?;

        info!(container = %self.name(), id = %id, "Provider container created and started");
        Ok(LifecycleOutcome::Created { id })
    }

    /// Report the container status. Never fails.
    pub async fn status(&self) -> StatusReport {
        if let Err(e) = self.runtime.ping().await {
            return StatusReport::runtime_unavailable(e.to_string());
        }

        match self.runtime.inspect(self.name()).await {
            Ok(details) => StatusReport::live(&details),
            Err(e) if e.is_not_found() => StatusReport::not_found(),
            Err(e) => {
                warn!(container = %self.name(), error = %e, "Failed to inspect container");
                StatusReport::error(e.to_string())
            }
        }
    }

    /// The last `lines` log lines, with timestamps.
    ///
    /// Returns a readable placeholder instead of failing.
    pub async fn logs(&self, lines: usize) -> String {
        match self.runtime.logs(self.name(), lines).await {
            Ok(logs) => logs,
            Err(e) if e.is_not_found() => {
                "Provider container does not exist or has not been started".to_string()
            }
            Err(e) => {
                warn!(container = %self.name(), error = %e, "Failed to fetch logs");
                format!("Failed to fetch logs: {e}")
            }
        }
    }

    /// A resource sample, only while the container is running.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Runtime` if the runtime call fails.
    pub async fn resource_snapshot(&self) -> Result<Option<ResourceSample>> {
        match self.find().await? {
            Some(details) if details.state.is_running() => {
                Ok(Some(self.runtime.stats(self.name()).await?))
            }
            _ => Ok(None),
        }
    }
}
