//! Provider console - HTTP management service for a bandwidth-sharing
//! provider container.
//!
//! Configuration comes from environment variables (see
//! [`ConsoleConfig::from_env`]). Set `RUST_LOG` to adjust logging.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use provider_console_auth::{AuthResolver, TokioProcessRunner};
use provider_console_control::ConsoleService;
use provider_console_core::SystemClock;
use provider_console_gateway::{create_router, ConsoleConfig, GatewayState};
use provider_console_runtime::DockerRuntime;
use provider_console_store::FsCredentialStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,provider_console=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting provider console");

    let config = ConsoleConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.gateway.listen_addr,
        config_dir = %config.provider.config_dir.display(),
        container = %config.provider.container_name,
        image = %config.provider.image,
        "Configuration loaded"
    );

    let clock = Arc::new(SystemClock);
    let store = Arc::new(FsCredentialStore::unchecked(&config.auth.config_dir));
    let auth = AuthResolver::discover(
        config.auth.clone(),
        store,
        Arc::new(TokioProcessRunner),
        clock.clone(),
    )
    .await;
    tracing::info!(methods = ?auth.available_methods(), "Authentication methods discovered");

    let runtime = Arc::new(DockerRuntime::connect(config.runtime.clone()));
    let console = ConsoleService::new(Arc::new(auth), runtime, config.provider.clone(), clock);

    let listen_addr = config.gateway.listen_addr.clone();
    let app = create_router(GatewayState::new(Arc::new(console), config.gateway));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
