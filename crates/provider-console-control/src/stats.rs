//! Statistics derived from provider logs and runtime counters.
//!
//! Parsing is pure ([`parse_logs`], [`parse_resources`]); [`StatsCollector`]
//! combines a fresh pass over the runtime with the last successful snapshot,
//! which it serves whenever the runtime fails.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use provider_console_core::Clock;
use provider_console_runtime::{ContainerRuntime, CpuStats, ResourceSample, RuntimeError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of log lines scanned per pass.
pub const LOG_WINDOW: usize = 50;

const UNKNOWN: &str = "unknown";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

static CLIENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"client_id:\s*([a-f0-9-]+)").expect("valid client_id pattern"));
static INSTANCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"instance_id:\s*([a-f0-9-]+)").expect("valid instance_id pattern")
});
static SUCCESS_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"success=(\d+)").expect("valid success pattern"));
static ERROR_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"error=(\d+)").expect("valid error pattern"));

/// Resource usage derived from a runtime sample. Values are rounded to one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Memory in use as a percentage of the limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    /// Memory in use, in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage_mb: Option<f64>,
    /// CPU usage percentage, clamped to 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    /// Bytes received across all interfaces, in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_rx: Option<f64>,
    /// Bytes sent across all interfaces, in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_tx: Option<f64>,
}

/// Human-facing provider statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Total earnings.
    pub total_earnings: String,
    /// Traffic served.
    pub traffic_served: String,
    /// Container uptime as `<d>d <h>h <m>m`.
    pub uptime: String,
    /// `connected`, `failed` or `unknown`.
    pub connection_status: String,
    /// Client ID announced in the logs.
    pub client_id: String,
    /// Instance ID announced in the logs.
    pub instance_id: String,
    /// Sum of every `success=<n>` in the log window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_connections: Option<u64>,
    /// Sum of every `error=<n>` in the log window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_errors: Option<u64>,
    /// Runtime resource usage.
    #[serde(flatten)]
    pub resources: ResourceUsage,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            total_earnings: "0.00".to_string(),
            traffic_served: "0 MB".to_string(),
            uptime: UNKNOWN.to_string(),
            connection_status: UNKNOWN.to_string(),
            client_id: UNKNOWN.to_string(),
            instance_id: UNKNOWN.to_string(),
            successful_connections: None,
            connection_errors: None,
            resources: ResourceUsage::default(),
        }
    }
}

/// A snapshot plus the time of the last successful pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// The statistics.
    pub stats: StatsSnapshot,
    /// When the statistics were last refreshed successfully.
    pub last_update: Option<DateTime<Utc>>,
}

fn sum_counts(pattern: &Regex, logs: &str) -> Option<u64> {
    let mut matched = false;
    let mut total: u64 = 0;
    for caps in pattern.captures_iter(logs) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
            matched = true;
            total = total.saturating_add(n);
        }
    }
    matched.then_some(total)
}

/// Extract statistics from a window of log text.
#[must_use]
pub fn parse_logs(logs: &str) -> StatsSnapshot {
    let mut stats = StatsSnapshot::default();

    if let Some(caps) = CLIENT_ID.captures(logs) {
        stats.client_id = caps[1].to_string();
    }
    if let Some(caps) = INSTANCE_ID.captures(logs) {
        stats.instance_id = caps[1].to_string();
    }

    if logs.contains("Provider") && logs.contains("started") {
        stats.connection_status = "connected".to_string();
    } else if logs.to_lowercase().contains("failed") {
        stats.connection_status = "failed".to_string();
    }

    stats.successful_connections = sum_counts(&SUCCESS_COUNT, logs);
    stats.connection_errors = sum_counts(&ERROR_COUNT, logs);
    stats
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[allow(clippy::cast_precision_loss)]
fn to_mb(bytes: u64) -> f64 {
    round1(bytes as f64 / BYTES_PER_MB)
}

/// CPU usage between two samples, as a percentage of the container's cores.
///
/// Returns `None` when a counter is missing or the host counter did not advance.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cpu_percent(current: &CpuStats, previous: &CpuStats) -> Option<f64> {
    let usage = current.cpu_usage.as_ref()?;
    let total = usage.total_usage?;
    let prev_total = previous.cpu_usage.as_ref()?.total_usage?;
    let system = current.system_cpu_usage?;
    let prev_system = previous.system_cpu_usage?;

    let system_delta = system as f64 - prev_system as f64;
    if system_delta <= 0.0 {
        return None;
    }

    let cores = current
        .online_cpus
        .filter(|&n| n > 0)
        .or_else(|| usage.percpu_usage.as_ref().map(|v| v.len() as u64))
        .filter(|&n| n > 0)?;

    let cpu_delta = total as f64 - prev_total as f64;
    let percent = cpu_delta / system_delta * cores as f64 * 100.0;
    Some(round1(percent.clamp(0.0, 100.0)))
}

/// Derive resource usage from a runtime sample.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn parse_resources(sample: &ResourceSample) -> ResourceUsage {
    let mut usage = ResourceUsage::default();

    if let Some(memory) = &sample.memory_stats {
        if let Some(bytes) = memory.usage {
            usage.memory_usage_mb = Some(to_mb(bytes));
            if let Some(limit) = memory.limit.filter(|&l| l > 0) {
                usage.memory_usage = Some(round1(bytes as f64 / limit as f64 * 100.0));
            }
        }
    }

    if let (Some(current), Some(previous)) = (&sample.cpu_stats, &sample.precpu_stats) {
        usage.cpu_usage = cpu_percent(current, previous);
    }

    if let Some(networks) = &sample.networks {
        let (rx, tx) = networks.values().fold((0u64, 0u64), |(rx, tx), net| {
            (
                rx.saturating_add(net.rx_bytes.unwrap_or(0)),
                tx.saturating_add(net.tx_bytes.unwrap_or(0)),
            )
        });
        usage.network_rx = Some(to_mb(rx));
        usage.network_tx = Some(to_mb(tx));
    }

    usage
}

/// Render the time since `started_at` as `<d>d <h>h <m>m`.
#[must_use]
pub fn format_uptime(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    format!("{days}d {hours}h {minutes}m")
}

struct CachedStats {
    snapshot: StatsSnapshot,
    updated_at: DateTime<Utc>,
}

/// Collects statistics and remembers the last successful snapshot.
pub struct StatsCollector {
    clock: Arc<dyn Clock>,
    cache: RwLock<Option<CachedStats>>,
}

impl StatsCollector {
    /// Create a collector with an empty cache.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cache: RwLock::new(None),
        }
    }

    /// Collect fresh statistics for `container`.
    ///
    /// An absent container yields default statistics. If the runtime fails, the
    /// cached snapshot is returned instead (or defaults if nothing is cached),
    /// and the cache is left untouched.
    pub async fn collect<R: ContainerRuntime + ?Sized>(
        &self,
        runtime: &R,
        container: &str,
    ) -> StatsSnapshot {
        match self.gather(runtime, container).await {
            Ok(snapshot) => {
                *self.cache.write() = Some(CachedStats {
                    snapshot: snapshot.clone(),
                    updated_at: self.clock.now(),
                });
                snapshot
            }
            Err(e) => {
                warn!(container = %container, error = %e, "Stats collection failed, serving cached stats");
                self.cached().unwrap_or_default()
            }
        }
    }

    /// Collect statistics together with the time of the last successful pass.
    pub async fn report<R: ContainerRuntime + ?Sized>(
        &self,
        runtime: &R,
        container: &str,
    ) -> StatsReport {
        let stats = self.collect(runtime, container).await;
        StatsReport {
            stats,
            last_update: self.last_update(),
        }
    }

    /// The last successful snapshot, if any.
    #[must_use]
    pub fn cached(&self) -> Option<StatsSnapshot> {
        self.cache.read().as_ref().map(|c| c.snapshot.clone())
    }

    /// When the last successful pass finished.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.cache.read().as_ref().map(|c| c.updated_at)
    }

    /// Forget the cached snapshot and its timestamp.
    pub fn clear_cache(&self) {
        *self.cache.write() = None;
    }

    async fn gather<R: ContainerRuntime + ?Sized>(
        &self,
        runtime: &R,
        container: &str,
    ) -> Result<StatsSnapshot, RuntimeError> {
        let details = match runtime.inspect(container).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => {
                debug!(container = %container, "Container absent, reporting default stats");
                return Ok(StatsSnapshot::default());
            }
            Err(e) => return Err(e),
        };

        let logs = runtime.logs(container, LOG_WINDOW).await?;
        let mut snapshot = parse_logs(&logs);

        if details.state.is_running() {
            if let Some(started_at) = details.started_at {
                snapshot.uptime = format_uptime(started_at, self.clock.now());
            }
            let sample = runtime.stats(container).await?;
            snapshot.resources = parse_resources(&sample);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_console_core::ManualClock;
    use provider_console_runtime::{
        ContainerState, CpuUsage, MemoryStats, MockRuntime, NetworkCounters, Operation,
    };
    use std::collections::BTreeMap;

    const NAME: &str = "urnetwork-provider";

    fn cpu(total: u64, system: u64, online: Option<u64>, percpu: Option<Vec<u64>>) -> CpuStats {
        CpuStats {
            cpu_usage: Some(CpuUsage {
                total_usage: Some(total),
                percpu_usage: percpu,
            }),
            system_cpu_usage: Some(system),
            online_cpus: online,
        }
    }

    #[test]
    fn log_defaults() {
        let stats = parse_logs("");
        assert_eq!(stats, StatsSnapshot::default());
        assert_eq!(stats.total_earnings, "0.00");
        assert_eq!(stats.traffic_served, "0 MB");
        assert_eq!(stats.client_id, "unknown");
    }

    #[test]
    fn log_fields() {
        let logs = "\
2024-01-01T00:00:00Z client_id: 1a2b-3c4d\n\
2024-01-01T00:00:01Z instance_id: ff00-aa11\n\
2024-01-01T00:00:02Z Provider started\n\
2024-01-01T00:01:00Z window success=3 error=1\n\
2024-01-01T00:02:00Z window success=4 error=0\n";
        let stats = parse_logs(logs);
        assert_eq!(stats.client_id, "1a2b-3c4d");
        assert_eq!(stats.instance_id, "ff00-aa11");
        assert_eq!(stats.connection_status, "connected");
        assert_eq!(stats.successful_connections, Some(7));
        assert_eq!(stats.connection_errors, Some(1));
    }

    #[test]
    fn connection_status_failed_is_case_insensitive() {
        assert_eq!(parse_logs("Connect FAILED: timeout").connection_status, "failed");
        // `Provider` alone is not enough to count as connected.
        assert_eq!(parse_logs("Provider booting").connection_status, "unknown");
        assert_eq!(parse_logs("no counters here").successful_connections, None);
    }

    #[test]
    fn cpu_omitted_without_system_delta() {
        let current = cpu(2_000, 10_000, Some(2), None);
        let previous = cpu(1_000, 10_000, Some(2), None);
        assert_eq!(cpu_percent(&current, &previous), None);

        let went_backwards = cpu(1_000, 9_000, Some(2), None);
        assert_eq!(cpu_percent(&went_backwards, &previous), None);
    }

    #[test]
    fn cpu_uses_online_cpus_then_percpu_length() {
        let previous = cpu(0, 0, None, None);
        // 10% of the host across 2 cores.
        let online = cpu(100, 1_000, Some(2), Some(vec![0; 8]));
        assert_eq!(cpu_percent(&online, &previous), Some(20.0));

        let percpu = cpu(100, 1_000, None, Some(vec![0; 4]));
        assert_eq!(cpu_percent(&percpu, &previous), Some(40.0));

        let neither = cpu(100, 1_000, None, None);
        assert_eq!(cpu_percent(&neither, &previous), None);
    }

    #[test]
    fn cpu_is_clamped() {
        let previous = cpu(500, 0, None, None);
        let high = cpu(900, 1_000, Some(4), None);
        assert_eq!(cpu_percent(&high, &previous), Some(100.0));

        let low = cpu(100, 1_000, Some(4), None);
        assert_eq!(cpu_percent(&low, &previous), Some(0.0));
    }

    #[test]
    fn resources_round_to_one_decimal() {
        let mut networks = BTreeMap::new();
        networks.insert(
            "eth0".to_string(),
            NetworkCounters {
                rx_bytes: Some(1_048_576),
                tx_bytes: Some(524_288),
            },
        );
        networks.insert(
            "eth1".to_string(),
            NetworkCounters {
                rx_bytes: Some(1_048_576),
                tx_bytes: None,
            },
        );
        let sample = ResourceSample {
            memory_stats: Some(MemoryStats {
                usage: Some(157_286_400),
                limit: Some(1_073_741_824),
            }),
            cpu_stats: None,
            precpu_stats: None,
            networks: Some(networks),
        };

        let usage = parse_resources(&sample);
        assert_eq!(usage.memory_usage_mb, Some(150.0));
        assert_eq!(usage.memory_usage, Some(14.6));
        assert_eq!(usage.cpu_usage, None);
        assert_eq!(usage.network_rx, Some(2.0));
        assert_eq!(usage.network_tx, Some(0.5));
    }

    #[test]
    fn memory_percent_needs_a_limit() {
        let sample = ResourceSample {
            memory_stats: Some(MemoryStats {
                usage: Some(1_048_576),
                limit: Some(0),
            }),
            ..ResourceSample::default()
        };
        let usage = parse_resources(&sample);
        assert_eq!(usage.memory_usage_mb, Some(1.0));
        assert_eq!(usage.memory_usage, None);
        assert_eq!(parse_resources(&ResourceSample::default()), ResourceUsage::default());
    }

    #[test]
    fn uptime_format() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let later = start + chrono::Duration::seconds(2 * 86_400 + 3 * 3_600 + 4 * 60 + 59);
        assert_eq!(format_uptime(start, later), "2d 3h 4m");
        assert_eq!(format_uptime(later, start), "0d 0h 0m");
    }

    #[tokio::test]
    async fn absent_container_yields_defaults() {
        let runtime = MockRuntime::new();
        let collector = StatsCollector::new(Arc::new(ManualClock::at_unix(1_700_000_000)));

        let stats = collector.collect(&runtime, NAME).await;
        assert_eq!(stats, StatsSnapshot::default());
    }

    #[tokio::test]
    async fn running_container_combines_logs_and_resources() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let runtime = MockRuntime::new();
        runtime.insert_container(NAME, "img", ContainerState::Running);
        runtime.set_started_at(NAME, clock.now() - chrono::Duration::minutes(90));
        runtime.set_logs(NAME, "client_id: abc\nProvider started\n");
        runtime.set_stats(
            NAME,
            ResourceSample {
                memory_stats: Some(MemoryStats {
                    usage: Some(2_097_152),
                    limit: Some(4_194_304),
                }),
                ..ResourceSample::default()
            },
        );
        let collector = StatsCollector::new(clock.clone());

        let report = collector.report(&runtime, NAME).await;
        assert_eq!(report.stats.client_id, "abc");
        assert_eq!(report.stats.connection_status, "connected");
        assert_eq!(report.stats.uptime, "0d 1h 30m");
        assert_eq!(report.stats.resources.memory_usage, Some(50.0));
        assert_eq!(report.last_update, Some(clock.now()));
    }

    #[tokio::test]
    async fn stopped_container_skips_resource_sample() {
        let runtime = MockRuntime::new();
        runtime.insert_container(NAME, "img", ContainerState::Exited);
        runtime.set_logs(NAME, "Provider started\n");
        let collector = StatsCollector::new(Arc::new(ManualClock::at_unix(0)));

        let stats = collector.collect(&runtime, NAME).await;
        assert_eq!(stats.connection_status, "connected");
        assert_eq!(stats.uptime, "unknown");
        assert!(!runtime.calls().contains(&Operation::Stats));
    }

    #[tokio::test]
    async fn runtime_failure_serves_cache() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let runtime = MockRuntime::new();
        runtime.insert_container(NAME, "img", ContainerState::Exited);
        runtime.set_logs(NAME, "client_id: abc\n");
        let collector = StatsCollector::new(clock.clone());

        collector.collect(&runtime, NAME).await;
        let first_update = collector.last_update();
        assert!(first_update.is_some());

        clock.advance(chrono::Duration::minutes(5));
        runtime.set_reachable(false);
        let stats = collector.collect(&runtime, NAME).await;
        assert_eq!(stats.client_id, "abc");
        assert_eq!(collector.last_update(), first_update);

        runtime.set_reachable(true);
        runtime.fail_on(Operation::Logs);
        assert_eq!(collector.collect(&runtime, NAME).await.client_id, "abc");
        assert_eq!(collector.last_update(), first_update);
    }

    #[tokio::test]
    async fn failure_without_cache_yields_defaults() {
        let runtime = MockRuntime::unreachable();
        let collector = StatsCollector::new(Arc::new(ManualClock::at_unix(0)));

        assert_eq!(collector.collect(&runtime, NAME).await, StatsSnapshot::default());
        assert!(collector.last_update().is_none());
    }

    #[tokio::test]
    async fn clear_cache_resets_everything() {
        let runtime = MockRuntime::new();
        let collector = StatsCollector::new(Arc::new(ManualClock::at_unix(0)));
        collector.collect(&runtime, NAME).await;
        assert!(collector.cached().is_some());

        collector.clear_cache();
        assert!(collector.cached().is_none());
        assert!(collector.last_update().is_none());
    }
}
