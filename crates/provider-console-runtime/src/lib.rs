//! Container runtime access for provider-console.
//!
//! This crate provides the [`ContainerRuntime`] trait and [`DockerRuntime`]
//! implementation used to manage the single provider container. It handles:
//!
//! - Container inspection, creation, start/stop/restart and removal
//! - Image pulls
//! - Log tails and one-shot resource-usage samples
//! - Classifying transport failures (unreachable, not found, timed out)
//!
//! # Example
//!
//! ```no_run
//! use provider_console_runtime::{ContainerRuntime, DockerRuntime, RuntimeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = DockerRuntime::connect(RuntimeConfig::default());
//!
//! runtime.ping().await?;
//! let details = runtime.inspect("urnetwork-provider").await?;
//! println!("{} is {}", details.name, details.state.as_str());
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! For testing without a Docker daemon, enable the `test-utils` feature and use
//! the mock runtime:
//!
//! ```ignore
//! use provider_console_runtime::{ContainerRuntime, ContainerState, MockRuntime};
//!
//! # async fn example() {
//! let runtime = MockRuntime::new();
//! runtime.insert_container("urnetwork-provider", "image", ContainerState::Exited);
//!
//! runtime.start("urnetwork-provider").await.unwrap();
//! assert_eq!(runtime.state_of("urnetwork-provider"), Some(ContainerState::Running));
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod docker;
pub mod error;
pub mod types;

pub use docker::{ContainerRuntime, DockerRuntime};
pub use error::{Result, RuntimeError};
pub use types::{
    ContainerDetails, ContainerSpec, ContainerState, CpuStats, CpuUsage, MemoryStats,
    NetworkCounters, ResourceSample, RestartPolicy, RuntimeConfig,
};

#[cfg(any(test, feature = "test-utils"))]
pub use docker::mock::{MockRuntime, Operation};
