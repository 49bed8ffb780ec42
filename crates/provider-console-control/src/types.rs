//! Settings and report types for the provider console.

use std::collections::BTreeMap;
use std::path::PathBuf;

use provider_console_runtime::{ContainerDetails, ContainerSpec, RestartPolicy};
use provider_console_store::schema::CLIENT_CONFIG_MOUNT;
use serde::{Deserialize, Serialize};

/// The provider container being managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Fixed container name.
    #[serde(default = "ProviderSettings::default_container_name")]
    pub container_name: String,
    /// Image the container runs.
    #[serde(default = "ProviderSettings::default_image")]
    pub image: String,
    /// Host directory mounted as the client's configuration directory.
    #[serde(default = "ProviderSettings::default_config_dir")]
    pub config_dir: PathBuf,
    /// Value of `TZ` inside the container.
    #[serde(default = "ProviderSettings::default_timezone")]
    pub timezone: String,
    /// Command passed to the image.
    #[serde(default = "ProviderSettings::default_command")]
    pub command: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            container_name: Self::default_container_name(),
            image: Self::default_image(),
            config_dir: Self::default_config_dir(),
            timezone: Self::default_timezone(),
            command: Self::default_command(),
        }
    }
}

impl ProviderSettings {
    fn default_container_name() -> String {
        "urnetwork-provider".to_string()
    }

    fn default_image() -> String {
        "bringyour/community-provider:g4-latest".to_string()
    }

    fn default_config_dir() -> PathBuf {
        PathBuf::from("/addon_config/.urnetwork")
    }

    fn default_timezone() -> String {
        "Asia/Taipei".to_string()
    }

    fn default_command() -> Vec<String> {
        vec!["provide".to_string()]
    }

    /// The creation request for the provider container.
    #[must_use]
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec {
            name: self.container_name.clone(),
            image: self.image.clone(),
            command: self.command.clone(),
            env: vec![format!("TZ={}", self.timezone)],
            binds: vec![format!(
                "{}:{CLIENT_CONFIG_MOUNT}:rw",
                self.config_dir.display()
            )],
            restart_policy: RestartPolicy::UnlessStopped,
        }
    }
}

/// What a lifecycle operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LifecycleOutcome {
    /// An existing container was started.
    Started,
    /// The container was already running.
    AlreadyRunning,
    /// A running container was stopped.
    Stopped,
    /// The container was absent or not running.
    AlreadyStopped,
    /// The container was restarted.
    Restarted,
    /// A new container was created and started.
    Created {
        /// Runtime-assigned container ID.
        id: String,
    },
}

impl LifecycleOutcome {
    /// Human-readable description of the outcome.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Started => "Provider started".to_string(),
            Self::AlreadyRunning => "Provider is already running".to_string(),
            Self::Stopped => "Provider stopped".to_string(),
            Self::AlreadyStopped => "Provider is not running".to_string(),
            Self::Restarted => "Provider restarted".to_string(),
            Self::Created { id } => {
                let short: String = id.chars().take(12).collect();
                format!("Provider container created and started: {short}")
            }
        }
    }
}

/// Live details of the provider container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Container name.
    pub name: String,
    /// Creation time as reported by the runtime, or `unknown`.
    pub created: String,
    /// Last start time (RFC 3339), or `unknown`.
    pub started: String,
    /// Image reference, or `unknown`.
    pub image: String,
    /// Published ports keyed by container port.
    pub ports: BTreeMap<String, Vec<String>>,
    /// Health-check status, or `unknown`.
    pub health: String,
}

/// Container status as reported to operators.
///
/// `status` is `runtime_unavailable`, `not_found`, `error`, or the container's
/// own state (`running`, `exited`, ...), in which case `container` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Overall status.
    pub status: String,
    /// Human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Live container details.
    #[serde(flatten)]
    pub container: Option<ContainerSummary>,
}

const UNKNOWN: &str = "unknown";

impl StatusReport {
    /// The runtime could not be reached.
    #[must_use]
    pub fn runtime_unavailable(error: impl Into<String>) -> Self {
        Self {
            status: "runtime_unavailable".to_string(),
            message: Some("Cannot connect to the container runtime".to_string()),
            error: Some(error.into()),
            container: None,
        }
    }

    /// The container does not exist.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: "not_found".to_string(),
            message: Some("Provider container does not exist".to_string()),
            error: None,
            container: None,
        }
    }

    /// Inspection failed for another reason.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: None,
            error: Some(error.into()),
            container: None,
        }
    }

    /// Build a report from inspected details.
    #[must_use]
    pub fn live(details: &ContainerDetails) -> Self {
        Self {
            status: details.state.as_str().to_string(),
            message: None,
            error: None,
            container: Some(ContainerSummary {
                name: details.name.clone(),
                created: details.created.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                started: details
                    .started_at
                    .map_or_else(|| UNKNOWN.to_string(), |t| t.to_rfc3339()),
                image: details.image.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                ports: details.ports.clone(),
                health: details.health.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            }),
        }
    }

    /// Returns true if the container is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.container.is_some() && self.status == "running"
    }
}
