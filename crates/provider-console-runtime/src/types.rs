//! Types for the runtime crate.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a container as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// Running.
    Running,
    /// Paused.
    Paused,
    /// Restarting.
    Restarting,
    /// Being removed.
    Removing,
    /// Stopped.
    Exited,
    /// Failed to stop cleanly.
    Dead,
    /// State cannot be determined.
    #[default]
    Unknown,
}

impl ContainerState {
    /// Parse a state from a Docker status string.
    #[must_use]
    pub fn from_docker(status: &str) -> Self {
        match status {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Returns the Docker status string for this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }

    /// Check if the container is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Inspection result for a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetails {
    /// Runtime-assigned container ID.
    pub id: String,
    /// Container name, without the leading slash.
    pub name: String,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// Image reference the container was created from.
    pub image: Option<String>,
    /// Creation timestamp, as reported by the runtime.
    pub created: Option<String>,
    /// Last start time, if the container was ever started.
    pub started_at: Option<DateTime<Utc>>,
    /// Published ports, keyed by container port (e.g. `80/tcp`).
    pub ports: BTreeMap<String, Vec<String>>,
    /// Health-check status, if the image defines one.
    pub health: Option<String>,
}

impl ContainerDetails {
    /// Build details from a Docker inspect document.
    ///
    /// Field names follow the Engine API (`Id`, `Name`, `State.Status`, ...).
    #[must_use]
    pub fn from_inspect(doc: &Value) -> Self {
        let str_at = |pointer: &str| {
            doc.pointer(pointer)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let state = str_at("/State/Status")
            .map_or(ContainerState::Unknown, |s| ContainerState::from_docker(&s));

        let started_at = str_at("/State/StartedAt")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc))
            // Never-started containers report the zero time.
            .filter(|t| t.year() > 1);

        let mut ports = BTreeMap::new();
        if let Some(map) = doc.pointer("/NetworkSettings/Ports").and_then(Value::as_object) {
            for (port, bindings) in map {
                let published = bindings
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .map(|b| {
                                let ip = b.get("HostIp").and_then(Value::as_str).unwrap_or("");
                                let port = b.get("HostPort").and_then(Value::as_str).unwrap_or("");
                                if ip.is_empty() {
                                    port.to_string()
                                } else {
                                    format!("{ip}:{port}")
                                }
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ports.insert(port.clone(), published);
            }
        }

        Self {
            id: str_at("/Id").unwrap_or_default(),
            name: str_at("/Name")
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            state,
            image: str_at("/Config/Image"),
            created: str_at("/Created"),
            started_at,
            ports,
            health: str_at("/State/Health/Status"),
        }
    }
}

/// Restart policy applied to a created container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart.
    No,
    /// Always restart.
    Always,
    /// Restart unless explicitly stopped.
    #[default]
    UnlessStopped,
    /// Restart only on non-zero exit.
    OnFailure,
}

/// Everything needed to create a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Command arguments passed to the image entrypoint.
    pub command: Vec<String>,
    /// Environment entries in `KEY=value` form.
    pub env: Vec<String>,
    /// Bind mounts in `host:container[:mode]` form.
    pub binds: Vec<String>,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
}

/// Memory counters from a stats sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Bytes in use.
    #[serde(default)]
    pub usage: Option<u64>,
    /// Memory limit in bytes.
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Cumulative CPU time counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuUsage {
    /// Total CPU time consumed, in nanoseconds.
    #[serde(default)]
    pub total_usage: Option<u64>,
    /// Per-core CPU time (cgroup v1 only).
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

/// CPU counters from a stats sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Container CPU usage.
    #[serde(default)]
    pub cpu_usage: Option<CpuUsage>,
    /// Host CPU time, in nanoseconds.
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    /// Number of CPUs available to the container.
    #[serde(default)]
    pub online_cpus: Option<u64>,
}

/// Per-interface network counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    /// Bytes received.
    #[serde(default)]
    pub rx_bytes: Option<u64>,
    /// Bytes sent.
    #[serde(default)]
    pub tx_bytes: Option<u64>,
}

/// A single resource-usage sample, in the runtime's stats JSON shape.
///
/// Every field is optional; the runtime omits counters it cannot provide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Memory counters.
    #[serde(default)]
    pub memory_stats: Option<MemoryStats>,
    /// CPU counters at sample time.
    #[serde(default)]
    pub cpu_stats: Option<CpuStats>,
    /// CPU counters at the previous sample.
    #[serde(default)]
    pub precpu_stats: Option<CpuStats>,
    /// Network counters, keyed by interface name.
    #[serde(default)]
    pub networks: Option<BTreeMap<String, NetworkCounters>>,
}

/// Configuration for the Docker runtime client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Transport timeout for every Engine API call, in seconds.
    pub timeout_secs: u64,
    /// Grace period given to a container on stop, in seconds.
    pub stop_grace_secs: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            stop_grace_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn container_state_from_docker() {
        assert_eq!(ContainerState::from_docker("running"), ContainerState::Running);
        assert_eq!(ContainerState::from_docker("exited"), ContainerState::Exited);
        assert_eq!(ContainerState::from_docker("created"), ContainerState::Created);
        assert_eq!(ContainerState::from_docker("bogus"), ContainerState::Unknown);
        assert!(ContainerState::Running.is_running());
        assert!(!ContainerState::Paused.is_running());
    }

    #[test]
    fn details_from_inspect_document() {
        let doc = json!({
            "Id": "abc123",
            "Name": "/urnetwork-provider",
            "Created": "2024-05-01T10:00:00.123456789Z",
            "State": {
                "Status": "running",
                "Running": true,
                "StartedAt": "2024-05-01T10:00:01.5Z",
                "Health": {"Status": "healthy"}
            },
            "Config": {"Image": "bringyour/community-provider:g4-latest"},
            "NetworkSettings": {
                "Ports": {
                    "80/tcp": [{"HostIp": "0.0.0.0", "HostPort": "8080"}],
                    "443/tcp": null
                }
            }
        });

        let details = ContainerDetails::from_inspect(&doc);
        assert_eq!(details.id, "abc123");
        assert_eq!(details.name, "urnetwork-provider");
        assert_eq!(details.state, ContainerState::Running);
        assert_eq!(
            details.image.as_deref(),
            Some("bringyour/community-provider:g4-latest")
        );
        assert_eq!(details.health.as_deref(), Some("healthy"));
        assert_eq!(details.started_at.unwrap().timestamp(), 1_714_557_601);
        assert_eq!(details.ports["80/tcp"], vec!["0.0.0.0:8080"]);
        assert!(details.ports["443/tcp"].is_empty());
    }

    #[test]
    fn never_started_container_has_no_start_time() {
        let doc = json!({
            "Id": "abc",
            "Name": "/p",
            "State": {"Status": "created", "StartedAt": "0001-01-01T00:00:00Z"}
        });

        let details = ContainerDetails::from_inspect(&doc);
        assert_eq!(details.state, ContainerState::Created);
        assert!(details.started_at.is_none());
        assert!(details.health.is_none());
        assert!(details.ports.is_empty());
    }

    #[test]
    fn resource_sample_parses_engine_stats() {
        let doc = json!({
            "read": "2024-05-01T10:00:00Z",
            "memory_stats": {"usage": 52_428_800u64, "limit": 1_073_741_824u64, "stats": {}},
            "cpu_stats": {
                "cpu_usage": {"total_usage": 2_000_000u64, "percpu_usage": [1, 2]},
                "system_cpu_usage": 20_000_000u64,
                "online_cpus": 2
            },
            "precpu_stats": {
                "cpu_usage": {"total_usage": 1_000_000u64},
                "system_cpu_usage": 10_000_000u64
            },
            "networks": {"eth0": {"rx_bytes": 1_048_576u64, "tx_bytes": 2_097_152u64}}
        });

        let sample: ResourceSample = serde_json::from_value(doc).unwrap();
        assert_eq!(sample.memory_stats.unwrap().usage, Some(52_428_800));
        assert_eq!(sample.cpu_stats.unwrap().online_cpus, Some(2));
        assert_eq!(sample.networks.unwrap()["eth0"].tx_bytes, Some(2_097_152));
    }

    #[test]
    fn resource_sample_tolerates_nulls() {
        let doc = json!({"memory_stats": null, "networks": null, "cpu_stats": {"cpu_usage": null}});
        let sample: ResourceSample = serde_json::from_value(doc).unwrap();
        assert!(sample.memory_stats.is_none());
        assert!(sample.networks.is_none());
        assert!(sample.cpu_stats.unwrap().cpu_usage.is_none());
    }
}
