//! Provider container control for provider-console.
//!
//! This crate provides the business logic behind the console: managing the
//! provider container's lifecycle, deriving statistics from its logs and
//! resource counters, and exposing both together with authentication through
//! one service facade.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gateway (HTTP)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ConsoleService                         │
//! │  ┌─────────────┐ ┌─────────────────────┐ ┌─────────────┐   │
//! │  │    Auth     │ │     Lifecycle       │ │    Stats    │   │
//! │  │  Resolver   │ │     Controller      │ │  Collector  │   │
//! │  └─────────────┘ └─────────────────────┘ └─────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!               │              │                  │
//!               ▼              ▼                  ▼
//!        ┌────────────┐  ┌──────────────────────────────┐
//!        │ Credential │  │      ContainerRuntime        │
//!        │   Store    │  │         (Docker)             │
//!        └────────────┘  └──────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use provider_console_auth::{AuthConfig, AuthResolver, TokioProcessRunner};
//! use provider_console_control::{ConsoleService, ProviderConsole, ProviderSettings};
//! use provider_console_core::SystemClock;
//! use provider_console_runtime::{DockerRuntime, RuntimeConfig};
//! use provider_console_store::FsCredentialStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ProviderSettings::default();
//! let store = Arc::new(FsCredentialStore::open(&settings.config_dir)?);
//! let clock = Arc::new(SystemClock);
//! let auth = AuthResolver::discover(
//!     AuthConfig::default(),
//!     store,
//!     Arc::new(TokioProcessRunner),
//!     clock.clone(),
//! )
//! .await;
//!
//! let runtime = Arc::new(DockerRuntime::connect(RuntimeConfig::default()));
//! let console = ConsoleService::new(Arc::new(auth), runtime, settings, clock);
//!
//! let result = console.start_provider().await;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod lifecycle;
pub mod service;
pub mod stats;
pub mod types;

pub use error::{ControlError, Result};
pub use lifecycle::LifecycleController;
pub use service::{ConsoleService, ProviderConsole};
pub use stats::{
    cpu_percent, format_uptime, parse_logs, parse_resources, ResourceUsage, StatsCollector,
    StatsReport, StatsSnapshot,
};
pub use types::{ContainerSummary, LifecycleOutcome, ProviderSettings, StatusReport};

// Re-export commonly used types from dependencies for convenience
pub use provider_console_auth::AuthStatus;
pub use provider_console_core::{ActionResult, ErrorKind};
