//! Gateway configuration types.
//!
//! [`GatewayConfig`] covers the HTTP server; [`ConsoleConfig`] bundles it with
//! the provider, runtime and authentication settings and loads everything from
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use provider_console_auth::AuthConfig;
use provider_console_control::ProviderSettings;
use provider_console_runtime::RuntimeConfig;
use serde::Deserialize;
use thiserror::Error;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8099").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Timeout in seconds for read-only requests (health, status, logs, stats).
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Upper bound on `lines` for log requests.
    #[serde(default = "GatewayConfig::default_max_log_lines")]
    pub max_log_lines: usize,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8099".to_string()
    }

    const fn default_max_body() -> usize {
        64 * 1024
    }

    const fn default_request_timeout() -> u64 {
        300
    }

    const fn default_max_log_lines() -> usize {
        5_000
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            max_log_lines: Self::default_max_log_lines(),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set to something that cannot be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
}

/// Everything the binary needs to wire the console together.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// HTTP server settings.
    pub gateway: GatewayConfig,
    /// The provider container.
    pub provider: ProviderSettings,
    /// Docker client settings.
    pub runtime: RuntimeConfig,
    /// Authentication settings.
    pub auth: AuthConfig,
}

impl ConsoleConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    ///
    /// Recognized variables: `LISTEN_ADDR`, `CONFIG_DIR`, `CONTAINER_NAME`,
    /// `PROVIDER_IMAGE`, `PROVIDER_TZ`, `DOCKER_TIMEOUT_SECS`,
    /// `AUTH_RUNTIME_CHECKS` and `AUTH_ALLOW_UNVERIFIED`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut gateway = GatewayConfig::default();
        let mut provider = ProviderSettings::default();
        let mut runtime = RuntimeConfig::default();
        let mut auth = AuthConfig::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            gateway.listen_addr = addr;
        }
        if let Some(dir) = lookup("CONFIG_DIR") {
            provider.config_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("CONTAINER_NAME") {
            provider.container_name = name;
        }
        if let Some(image) = lookup("PROVIDER_IMAGE") {
            provider.image = image;
        }
        if let Some(tz) = lookup("PROVIDER_TZ") {
            provider.timezone = tz;
        }
        if let Some(value) = lookup("DOCKER_TIMEOUT_SECS") {
            runtime.timeout_secs = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "DOCKER_TIMEOUT_SECS",
                value: value.clone(),
                reason: "expected a whole number of seconds",
            })?;
        }
        if let Some(value) = lookup("AUTH_RUNTIME_CHECKS") {
            auth.runtime_checks = parse_bool("AUTH_RUNTIME_CHECKS", &value)?;
        }
        if let Some(value) = lookup("AUTH_ALLOW_UNVERIFIED") {
            auth.allow_unverified = parse_bool("AUTH_ALLOW_UNVERIFIED", &value)?;
        }

        // The resolver and the container must agree on the directory and names.
        auth.config_dir.clone_from(&provider.config_dir);
        auth.container_name.clone_from(&provider.container_name);
        auth.image.clone_from(&provider.image);

        Ok(Self {
            gateway,
            provider,
            runtime,
            auth,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ConsoleConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ConsoleConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8099");
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.gateway.listen_addr, "0.0.0.0:8099");
        assert_eq!(config.provider.container_name, "urnetwork-provider");
        assert_eq!(config.runtime.timeout_secs, 120);
        assert!(!config.auth.runtime_checks);
        assert_eq!(config.auth.config_dir, config.provider.config_dir);
    }

    #[test]
    fn environment_overrides() {
        let config = load(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("CONFIG_DIR", "/data/urnetwork"),
            ("CONTAINER_NAME", "provider"),
            ("PROVIDER_TZ", "UTC"),
            ("DOCKER_TIMEOUT_SECS", "30"),
            ("AUTH_RUNTIME_CHECKS", "yes"),
            ("AUTH_ALLOW_UNVERIFIED", "TRUE"),
        ])
        .unwrap();
        assert_eq!(config.gateway.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.provider.config_dir, PathBuf::from("/data/urnetwork"));
        assert_eq!(config.auth.config_dir, PathBuf::from("/data/urnetwork"));
        assert_eq!(config.auth.container_name, "provider");
        assert_eq!(config.provider.timezone, "UTC");
        assert_eq!(config.runtime.timeout_secs, 30);
        assert!(config.auth.runtime_checks);
        assert!(config.auth.allow_unverified);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load(&[("DOCKER_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "DOCKER_TIMEOUT_SECS",
                ..
            }
        ));

        let err = load(&[("AUTH_RUNTIME_CHECKS", "maybe")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for AUTH_RUNTIME_CHECKS: \"maybe\" (expected true or false)"
        );
    }
}
