//! Provider authentication for provider-console.
//!
//! The provider client accepts a one-time authentication code and leaves token
//! files in its configuration directory. How the client can be reached varies by
//! host, so this crate discovers every available method at startup and tries
//! them in priority order:
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   AuthResolver   │
//! │   (HTTP)         │     │   (serialized)   │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │ in order
//!          ┌────────────────────────┼────────────────────────┐
//!          ▼                        ▼                        ▼
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  DirectProbe     │     │  SandboxProbe    │     │  ManualProbe     │
//! │  (local binary)  │     │  (docker run)    │     │  (last resort)   │
//! └────────┬─────────┘     └────────┬─────────┘     └────────┬─────────┘
//!          └────────────────────────┼────────────────────────┘
//!                                   ▼
//!                          ┌──────────────────┐
//!                          │ CredentialStore  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use provider_console_auth::{AuthConfig, AuthResolver, TokioProcessRunner};
//! use provider_console_core::SystemClock;
//! use provider_console_store::FsCredentialStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::default();
//! let store = Arc::new(FsCredentialStore::open(&config.config_dir)?);
//! let resolver = AuthResolver::discover(
//!     config,
//!     store,
//!     Arc::new(TokioProcessRunner),
//!     Arc::new(SystemClock),
//! )
//! .await;
//!
//! let outcome = resolver.authenticate("my-one-time-code").await?;
//! println!("Authenticated via {}", outcome.method);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod discovery;
pub mod error;
pub mod probe;
pub mod process;
pub mod resolver;

use std::path::PathBuf;
use std::time::Duration;

pub use discovery::{discover, AuthMethod, DiscoveryConfig, MethodKind};
pub use error::{AuthError, Result};
pub use probe::{CredentialProbe, ProbeError, ProbeSuccess, ProbeTimings};
pub use process::{CommandOutput, CommandSpec, ProcessError, ProcessRunner, TokioProcessRunner};
pub use resolver::{AuthOutcome, AuthResolver, AuthStatus, Evidence};

#[cfg(any(test, feature = "test-utils"))]
pub use process::mock::MockProcessRunner;

/// Configuration for the authentication resolver.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Directory the provider client reads its credentials from.
    pub config_dir: PathBuf,
    /// Name of the long-running provider container.
    pub container_name: String,
    /// Image used by the sandboxed fallback and status checks.
    pub image: String,
    /// Consult the container runtime when no file evidence exists.
    pub runtime_checks: bool,
    /// Accept a sandboxed success claim that produced no files.
    pub allow_unverified: bool,
    /// Pause between clearing old credentials and the first attempt.
    pub clear_settle: Duration,
    /// How long a successful record counts as evidence, in seconds.
    pub freshness_window_secs: f64,
    /// Bound on the `ps` status check.
    pub status_timeout: Duration,
    /// Bound on the sandboxed `status` check.
    pub sandbox_status_timeout: Duration,
    /// Probe delays and bounds.
    pub timings: ProbeTimings,
    /// Where to look for authentication methods.
    pub discovery: DiscoveryConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/addon_config/.urnetwork"),
            container_name: "urnetwork-provider".to_string(),
            image: "bringyour/community-provider:g4-latest".to_string(),
            runtime_checks: false,
            allow_unverified: false,
            clear_settle: Duration::from_millis(500),
            freshness_window_secs: provider_console_store::FRESHNESS_WINDOW_SECS,
            status_timeout: Duration::from_secs(10),
            sandbox_status_timeout: Duration::from_secs(30),
            timings: ProbeTimings::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_console_core::ErrorKind;

    #[test]
    fn default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.config_dir, PathBuf::from("/addon_config/.urnetwork"));
        assert_eq!(config.container_name, "urnetwork-provider");
        assert!(!config.runtime_checks);
        assert!(!config.allow_unverified);
        assert!((config.freshness_window_secs - 86_400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::EmptyCredential.http_status_code(), 400);
        assert_eq!(
            AuthError::AllMethodsExhausted {
                attempted: vec!["manual_fallback".into()]
            }
            .http_status_code(),
            400
        );
        let timeout = AuthError::Process(ProcessError::Timeout {
            program: "docker".into(),
            timeout: Duration::from_secs(10),
        });
        assert_eq!(timeout.kind(), ErrorKind::OperationTimeout);
        assert_eq!(timeout.http_status_code(), 504);
    }

    #[test]
    fn auth_error_retriable() {
        assert!(!AuthError::EmptyCredential.is_retriable());
        let timeout = AuthError::Process(ProcessError::Timeout {
            program: "docker".into(),
            timeout: Duration::from_secs(10),
        });
        assert!(timeout.is_retriable());
    }

    #[test]
    fn exhausted_message_lists_methods() {
        let err = AuthError::AllMethodsExhausted {
            attempted: vec!["direct_binary".into(), "manual_fallback".into()],
        };
        assert_eq!(
            err.to_string(),
            "all authentication methods failed (tried: direct_binary, manual_fallback)"
        );
    }
}
