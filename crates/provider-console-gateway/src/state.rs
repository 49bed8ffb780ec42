//! Gateway application state.

use std::sync::Arc;

use provider_console_control::ProviderConsole;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<C: ProviderConsole> {
    /// The console service.
    pub console: Arc<C>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C: ProviderConsole> GatewayState<C> {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(console: Arc<C>, config: GatewayConfig) -> Self {
        Self { console, config }
    }
}

impl<C: ProviderConsole> Clone for GatewayState<C> {
    fn clone(&self) -> Self {
        Self {
            console: Arc::clone(&self.console),
            config: self.config.clone(),
        }
    }
}
