//! Docker runtime implementation.
//!
//! This module provides the `ContainerRuntime` trait and the `DockerRuntime`
//! which drives the Docker Engine API through `bollard`.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    RestartContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, RestartPolicyNameEnum};
use bollard::Docker;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::types::{
    ContainerDetails, ContainerSpec, ResourceSample, RestartPolicy, RuntimeConfig,
};
use crate::{Result, RuntimeError};

/// The `ContainerRuntime` trait defines every call the console makes to the
/// container control plane.
///
/// Containers are addressed by name.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the control plane is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Unavailable` if it is not.
    async fn ping(&self) -> Result<()>;

    /// Inspect a container.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn inspect(&self, name: &str) -> Result<ContainerDetails>;

    /// Create a container from `spec`, returning its ID. The container is not started.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails (for example, the name is taken).
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a stopped or freshly created container.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn start(&self, name: &str) -> Result<()>;

    /// Stop a running container. Stopping an already stopped container succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn stop(&self, name: &str) -> Result<()>;

    /// Restart a container.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn restart(&self, name: &str) -> Result<()>;

    /// Force-remove a container.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Pull an image, waiting for the pull to complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be pulled.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Fetch the last `tail` log lines (stdout and stderr) with timestamps.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn logs(&self, name: &str, tail: usize) -> Result<String>;

    /// Take a single resource-usage sample.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotFound` if the container does not exist.
    async fn stats(&self, name: &str) -> Result<ResourceSample>;
}

/// Docker-backed container runtime.
///
/// Construction never fails: if the local Docker socket cannot be configured the
/// runtime is still built and every call reports `RuntimeError::Unavailable`.
pub struct DockerRuntime {
    docker: Option<Docker>,
    config: RuntimeConfig,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon using the platform defaults
    /// (`DOCKER_HOST` or the local socket).
    #[must_use]
    pub fn connect(config: RuntimeConfig) -> Self {
        let docker = match Docker::connect_with_local_defaults() {
            Ok(docker) => {
                debug!(timeout_secs = config.timeout_secs, "Docker client configured");
                Some(docker.with_timeout(Duration::from_secs(config.timeout_secs)))
            }
            Err(e) => {
                warn!(error = %e, "Docker client unavailable");
                None
            }
        };

        Self { docker, config }
    }

    /// Get a reference to the runtime config.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn client(&self) -> Result<&Docker> {
        self.docker
            .as_ref()
            .ok_or_else(|| RuntimeError::Unavailable("Docker client not configured".to_string()))
    }
}

fn restart_policy_name(policy: RestartPolicy) -> RestartPolicyNameEnum {
    match policy {
        RestartPolicy::No => RestartPolicyNameEnum::NO,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        RestartPolicy::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.client()?
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| match RuntimeError::from(e) {
                // Any failure to ping means the daemon is not usable.
                err @ RuntimeError::Unavailable(_) => err,
                other => RuntimeError::Unavailable(other.to_string()),
            })
    }

    async fn inspect(&self, name: &str) -> Result<ContainerDetails> {
        let info = self
            .client()?
            .inspect_container(name, None::<InspectContainerOptions>)
            .await?;

        let doc = serde_json::to_value(&info).map_err(|e| RuntimeError::Failed {
            status_code: 500,
            message: format!("unreadable inspect response: {e}"),
        })?;
        Ok(ContainerDetails::from_inspect(&doc))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            env: Some(spec.env.clone()),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                restart_policy: Some(bollard::models::RestartPolicy {
                    name: Some(restart_policy_name(spec.restart_policy)),
                    maximum_retry_count: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .client()?
            .create_container(Some(options), config)
            .await?;

        for warning in &response.warnings {
            warn!(container = %spec.name, warning = %warning, "Container create warning");
        }
        info!(container = %spec.name, id = %response.id, image = %spec.image, "Container created");
        Ok(response.id)
    }

    async fn start(&self, name: &str) -> Result<()> {
        match self
            .client()?
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => {
                debug!(container = %name, "Container started");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                // Already running
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let options = StopContainerOptions {
            t: self.config.stop_grace_secs,
        };

        match self.client()?.stop_container(name, Some(options)).await {
            Ok(()) => {
                debug!(container = %name, "Container stopped");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                // Already stopped
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.client()?
            .restart_container(name, None::<RestartContainerOptions>)
            .await?;
        debug!(container = %name, "Container restarted");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.client()?.remove_container(name, Some(options)).await?;
        debug!(container = %name, "Container removed");
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        info!(image = %image, "Pulling image");

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.client()?.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress?;
            if let Some(status) = progress.status {
                debug!(image = %image, status = %status, "Pull progress");
            }
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let chunks: Vec<_> = self
            .client()?
            .logs(name, Some(options))
            .try_collect()
            .await?;

        Ok(chunks.iter().map(ToString::to_string).collect())
    }

    async fn stats(&self, name: &str) -> Result<ResourceSample> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let mut stream = self.client()?.stats(name, Some(options));
        let stats = match stream.next().await {
            Some(stats) => stats?,
            None => {
                return Err(RuntimeError::Failed {
                    status_code: 500,
                    message: format!("no stats returned for {name}"),
                })
            }
        };

        let doc = serde_json::to_value(&stats).map_err(|e| RuntimeError::Failed {
            status_code: 500,
            message: format!("unreadable stats response: {e}"),
        })?;
        serde_json::from_value(doc).map_err(|e| RuntimeError::Failed {
            status_code: 500,
            message: format!("unreadable stats response: {e}"),
        })
    }
}

/// Mock runtime for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::types::ContainerState;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// A runtime call, used to inject failures and inspect call history.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Operation {
        /// `ping`
        Ping,
        /// `inspect`
        Inspect,
        /// `create`
        Create,
        /// `start`
        Start,
        /// `stop`
        Stop,
        /// `restart`
        Restart,
        /// `remove`
        Remove,
        /// `pull_image`
        Pull,
        /// `logs`
        Logs,
        /// `stats`
        Stats,
    }

    /// A mock runtime that keeps containers in memory.
    pub struct MockRuntime {
        inner: Mutex<MockState>,
    }

    struct MockState {
        reachable: bool,
        containers: HashMap<String, MockContainer>,
        failures: HashSet<Operation>,
        calls: Vec<(Operation, String)>,
        created: Vec<ContainerSpec>,
        pulled: Vec<String>,
        next_id: u64,
    }

    struct MockContainer {
        details: ContainerDetails,
        logs: String,
        stats: ResourceSample,
    }

    impl Default for MockRuntime {
        fn default() -> Self {
            Self {
                inner: Mutex::new(MockState {
                    reachable: true,
                    containers: HashMap::new(),
                    failures: HashSet::new(),
                    calls: Vec::new(),
                    created: Vec::new(),
                    pulled: Vec::new(),
                    next_id: 1,
                }),
            }
        }
    }

    impl MockRuntime {
        /// Create a new reachable mock runtime with no containers.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock runtime whose control plane cannot be reached.
        #[must_use]
        pub fn unreachable() -> Self {
            let runtime = Self::default();
            runtime.set_reachable(false);
            runtime
        }

        /// Toggle reachability.
        pub fn set_reachable(&self, reachable: bool) {
            self.inner.lock().reachable = reachable;
        }

        /// Add a container in the given state.
        pub fn insert_container(&self, name: &str, image: &str, state: ContainerState) {
            let mut inner = self.inner.lock();
            let id = format!("mock-{}", inner.next_id);
            inner.next_id += 1;
            inner.containers.insert(
                name.to_string(),
                MockContainer {
                    details: ContainerDetails {
                        id,
                        name: name.to_string(),
                        state,
                        image: Some(image.to_string()),
                        created: Some(Utc::now().to_rfc3339()),
                        started_at: state.is_running().then(Utc::now),
                        ports: std::collections::BTreeMap::new(),
                        health: None,
                    },
                    logs: String::new(),
                    stats: ResourceSample::default(),
                },
            );
        }

        /// Set the start time reported for a container.
        pub fn set_started_at(&self, name: &str, started_at: chrono::DateTime<Utc>) {
            if let Some(container) = self.inner.lock().containers.get_mut(name) {
                container.details.started_at = Some(started_at);
            }
        }

        /// Set the log text returned for a container.
        pub fn set_logs(&self, name: &str, logs: impl Into<String>) {
            if let Some(container) = self.inner.lock().containers.get_mut(name) {
                container.logs = logs.into();
            }
        }

        /// Set the stats sample returned for a container.
        pub fn set_stats(&self, name: &str, stats: ResourceSample) {
            if let Some(container) = self.inner.lock().containers.get_mut(name) {
                container.stats = stats;
            }
        }

        /// Make every subsequent `op` call fail with a runtime error.
        pub fn fail_on(&self, op: Operation) {
            self.inner.lock().failures.insert(op);
        }

        /// Stop injecting failures for `op`.
        pub fn clear_failure(&self, op: Operation) {
            self.inner.lock().failures.remove(&op);
        }

        /// Current state of a container, if it exists.
        #[must_use]
        pub fn state_of(&self, name: &str) -> Option<ContainerState> {
            self.inner
                .lock()
                .containers
                .get(name)
                .map(|c| c.details.state)
        }

        /// Get the number of containers.
        #[must_use]
        pub fn container_count(&self) -> usize {
            self.inner.lock().containers.len()
        }

        /// Specs passed to `create`, in order.
        #[must_use]
        pub fn created_specs(&self) -> Vec<ContainerSpec> {
            self.inner.lock().created.clone()
        }

        /// Images passed to `pull_image`, in order.
        #[must_use]
        pub fn pulled_images(&self) -> Vec<String> {
            self.inner.lock().pulled.clone()
        }

        /// Every call made so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<Operation> {
            self.inner.lock().calls.iter().map(|(op, _)| *op).collect()
        }

        /// Record a call and apply reachability and injected failures.
        fn enter(&self, op: Operation, target: &str) -> Result<parking_lot::MutexGuard<'_, MockState>> {
            let mut inner = self.inner.lock();
            inner.calls.push((op, target.to_string()));
            if !inner.reachable {
                return Err(RuntimeError::Unavailable("connection refused".to_string()));
            }
            if inner.failures.contains(&op) {
                return Err(RuntimeError::Failed {
                    status_code: 500,
                    message: format!("injected {op:?} failure"),
                });
            }
            Ok(inner)
        }
    }

    fn not_found(name: &str) -> RuntimeError {
        RuntimeError::NotFound(format!("No such container: {name}"))
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn ping(&self) -> Result<()> {
            self.enter(Operation::Ping, "").map(|_| ())
        }

        async fn inspect(&self, name: &str) -> Result<ContainerDetails> {
            let inner = self.enter(Operation::Inspect, name)?;
            inner
                .containers
                .get(name)
                .map(|c| c.details.clone())
                .ok_or_else(|| not_found(name))
        }

        async fn create(&self, spec: &ContainerSpec) -> Result<String> {
            let mut inner = self.enter(Operation::Create, &spec.name)?;
            if inner.containers.contains_key(&spec.name) {
                return Err(RuntimeError::Failed {
                    status_code: 409,
                    message: format!("Conflict. The container name \"/{}\" is already in use", spec.name),
                });
            }

            let id = format!("mock-{}", inner.next_id);
            inner.next_id += 1;
            inner.created.push(spec.clone());
            inner.containers.insert(
                spec.name.clone(),
                MockContainer {
                    details: ContainerDetails {
                        id: id.clone(),
                        name: spec.name.clone(),
                        state: ContainerState::Created,
                        image: Some(spec.image.clone()),
                        created: Some(Utc::now().to_rfc3339()),
                        started_at: None,
                        ports: std::collections::BTreeMap::new(),
                        health: None,
                    },
                    logs: String::new(),
                    stats: ResourceSample::default(),
                },
            );
            Ok(id)
        }

        async fn start(&self, name: &str) -> Result<()> {
            let mut inner = self.enter(Operation::Start, name)?;
            let container = inner.containers.get_mut(name).ok_or_else(|| not_found(name))?;
            if !container.details.state.is_running() {
                container.details.state = ContainerState::Running;
                container.details.started_at = Some(Utc::now());
            }
            Ok(())
        }

        async fn stop(&self, name: &str) -> Result<()> {
            let mut inner = self.enter(Operation::Stop, name)?;
            let container = inner.containers.get_mut(name).ok_or_else(|| not_found(name))?;
            container.details.state = ContainerState::Exited;
            Ok(())
        }

        async fn restart(&self, name: &str) -> Result<()> {
            let mut inner = self.enter(Operation::Restart, name)?;
            let container = inner.containers.get_mut(name).ok_or_else(|| not_found(name))?;
            container.details.state = ContainerState::Running;
            container.details.started_at = Some(Utc::now());
            Ok(())
        }

        async fn remove(&self, name: &str) -> Result<()> {
            let mut inner = self.enter(Operation::Remove, name)?;
            inner
                .containers
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found(name))
        }

        async fn pull_image(&self, image: &str) -> Result<()> {
            let mut inner = self.enter(Operation::Pull, image)?;
            inner.pulled.push(image.to_string());
            Ok(())
        }

        async fn logs(&self, name: &str, tail: usize) -> Result<String> {
            let inner = self.enter(Operation::Logs, name)?;
            let container = inner.containers.get(name).ok_or_else(|| not_found(name))?;
            let lines: Vec<&str> = container.logs.lines().collect();
            let start = lines.len().saturating_sub(tail);
            Ok(lines[start..]
                .iter()
                .map(|line| format!("{line}\n"))
                .collect())
        }

        async fn stats(&self, name: &str) -> Result<ResourceSample> {
            let inner = self.enter(Operation::Stats, name)?;
            inner
                .containers
                .get(name)
                .map(|c| c.stats.clone())
                .ok_or_else(|| not_found(name))
        }
    }
}
