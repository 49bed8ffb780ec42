//! HTTP gateway for the provider console.
//!
//! Exposes authentication, lifecycle control, status, logs and statistics
//! of the provider container as a small JSON API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Browser / Home Assistant                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTP
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 provider-console-gateway                     │
//! │        Router + Handlers  ──►  ProviderConsole trait         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │   Auth   │   │Lifecycle │   │  Stats   │
//!        │ Resolver │   │Controller│   │Collector │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use provider_console_auth::{AuthResolver, TokioProcessRunner};
//! use provider_console_control::ConsoleService;
//! use provider_console_core::SystemClock;
//! use provider_console_gateway::{create_router, ConsoleConfig, GatewayState};
//! use provider_console_runtime::DockerRuntime;
//! use provider_console_store::FsCredentialStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConsoleConfig::from_env()?;
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(FsCredentialStore::open(&config.auth.config_dir)?);
//! let auth = AuthResolver::discover(
//!     config.auth.clone(),
//!     store,
//!     Arc::new(TokioProcessRunner),
//!     clock.clone(),
//! )
//! .await;
//! let runtime = Arc::new(DockerRuntime::connect(config.runtime.clone()));
//! let console = ConsoleService::new(Arc::new(auth), runtime, config.provider.clone(), clock);
//!
//! let app = create_router(GatewayState::new(Arc::new(console), config.gateway));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8099").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ConsoleConfig, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
